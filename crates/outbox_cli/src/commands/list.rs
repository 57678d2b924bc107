//! List command implementation.

use crate::commands::{parse_status, status_name};
use outbox_store::{FileStore, OperationStore};
use std::path::Path;

/// Runs the list command.
pub fn run(
    path: &Path,
    status_filter: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = status_filter.map(parse_status).transpose()?;

    let loaded = FileStore::open(path).load();
    let operations: Vec<_> = loaded
        .operations
        .into_iter()
        .filter(|op| filter.map(|wanted| op.status == wanted).unwrap_or(true))
        .collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&operations)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("No operations");
        return Ok(());
    }

    for op in &operations {
        println!(
            "{}  {:<9}  {} {}  retries={}",
            op.id,
            status_name(op.status),
            op.method,
            op.path,
            op.retry_count
        );
        if let Some((resource_type, resource_id)) =
            op.resource_type.as_deref().zip(op.resource_id.as_deref())
        {
            println!("    resource: {}/{}", resource_type, resource_id);
        }
        if let Some(error) = &op.last_error {
            println!("    last error: {}", error);
        }
    }

    Ok(())
}
