//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting the operation log.
///
/// Only the write side surfaces errors; read failures degrade to an empty
/// log inside [`crate::OperationStore::load`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operation list could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}
