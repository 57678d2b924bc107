//! CLI command implementations.

pub mod clear;
pub mod list;
pub mod prune;
pub mod status;

use outbox_core::OperationStatus;

/// Parses a user-supplied status name.
pub fn parse_status(name: &str) -> Result<OperationStatus, String> {
    match name.to_ascii_lowercase().as_str() {
        "pending" => Ok(OperationStatus::Pending),
        "syncing" => Ok(OperationStatus::Syncing),
        "completed" => Ok(OperationStatus::Completed),
        "failed" => Ok(OperationStatus::Failed),
        "cancelled" => Ok(OperationStatus::Cancelled),
        other => Err(format!("unknown status: {}", other)),
    }
}

/// Lowercase display name for a status.
pub fn status_name(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "pending",
        OperationStatus::Syncing => "syncing",
        OperationStatus::Completed => "completed",
        OperationStatus::Failed => "failed",
        OperationStatus::Cancelled => "cancelled",
    }
}
