//! Error types for the queue and engine.

use outbox_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for queue and engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced across the engine's public boundary.
///
/// Replay-time failures are absorbed into operation state and never appear
/// here; only synchronous misuse and persistence failures do.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The queue already holds the configured maximum of live operations.
    #[error("queue capacity exceeded: {capacity} live operations")]
    CapacityExceeded {
        /// The configured capacity.
        capacity: usize,
    },

    /// The durable store rejected a write. The in-memory queue was rolled
    /// back, so memory and disk still agree.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No parked conflict exists for the given operation.
    #[error("no parked conflict for operation {id}")]
    UnknownConflict {
        /// The operation id passed to `resolve_conflict`.
        id: Uuid,
    },
}
