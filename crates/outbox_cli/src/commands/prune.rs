//! Prune command implementation.

use outbox_store::{FileStore, OperationStore};
use std::path::Path;
use tracing::info;

/// Runs the prune command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Pruning terminal operations from {:?}", path);

    let mut store = FileStore::open(path);
    let loaded = store.load();
    if loaded.degraded {
        return Err(format!("queue file {:?} could not be decoded; not rewriting", path).into());
    }

    let before = loaded.operations.len();
    let retained: Vec<_> = loaded
        .operations
        .into_iter()
        .filter(|op| !op.is_terminal())
        .collect();
    let removed = before - retained.len();

    if removed == 0 {
        println!("Nothing to prune ({} operations)", before);
        return Ok(());
    }

    store.save(&retained)?;
    println!("Pruned {} of {} operations", removed, before);

    Ok(())
}
