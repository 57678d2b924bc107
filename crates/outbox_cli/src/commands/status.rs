//! Status command implementation.

use outbox_store::{FileStore, OperationStore};
use serde::Serialize;
use std::path::Path;

/// Queue file status summary.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Queue file path.
    pub path: String,
    /// Total number of operations in the log.
    pub total: usize,
    /// Operations waiting for their first replay attempt.
    pub pending: usize,
    /// Operations persisted mid-replay.
    pub syncing: usize,
    /// Operations replayed successfully.
    pub completed: usize,
    /// Operations whose last replay attempt failed.
    pub failed: usize,
    /// Operations cancelled by the caller.
    pub cancelled: usize,
    /// True when the file exists but could not be decoded.
    pub degraded: bool,
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = FileStore::open(path).load();

    let mut report = StatusReport {
        path: path.display().to_string(),
        total: loaded.operations.len(),
        pending: 0,
        syncing: 0,
        completed: 0,
        failed: 0,
        cancelled: 0,
        degraded: loaded.degraded,
    };

    for op in &loaded.operations {
        match op.status {
            outbox_core::OperationStatus::Pending => report.pending += 1,
            outbox_core::OperationStatus::Syncing => report.syncing += 1,
            outbox_core::OperationStatus::Completed => report.completed += 1,
            outbox_core::OperationStatus::Failed => report.failed += 1,
            outbox_core::OperationStatus::Cancelled => report.cancelled += 1,
        }
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Queue file: {}", report.path);
        if report.degraded {
            println!("  WARNING: file exists but could not be decoded");
        }
        println!("  Total:     {}", report.total);
        println!("  Pending:   {}", report.pending);
        println!("  Syncing:   {}", report.syncing);
        println!("  Completed: {}", report.completed);
        println!("  Failed:    {}", report.failed);
        println!("  Cancelled: {}", report.cancelled);
    }

    Ok(())
}
