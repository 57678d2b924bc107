//! Clear command implementation.

use outbox_store::{FileStore, OperationStore};
use std::path::Path;
use tracing::info;

/// Runs the clear command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Clearing queue file {:?}", path);

    let mut store = FileStore::open(path);
    let before = store.load().operations.len();

    store.save(&[])?;
    println!("Cleared {} operations", before);

    Ok(())
}
