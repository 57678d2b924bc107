//! # Outbox Engine
//!
//! Offline operation queue and synchronization engine.
//!
//! This crate provides:
//! - Capacity-bounded operation queue with write-through persistence
//! - Sequential (FIFO) replay of pending operations against a server
//! - Bounded retries with per-operation failure diagnostics
//! - Pluggable conflict resolution (use-local, use-server, merge, ask-user)
//! - Connectivity-edge triggering with a settle delay
//! - An event feed for UI/state binding
//!
//! ## Architecture
//!
//! Business code enqueues operations through the [`SyncEngine`] (or the
//! [`OperationQueue`] directly); every mutation is persisted through an
//! [`outbox_store::OperationStore`] before it is acknowledged. When the
//! connectivity observer reports a connected edge, the engine waits out a
//! settle delay and then replays all eligible operations, one at a time and
//! strictly in insertion order, against the [`OperationExecutor`]
//! collaborator. Outcomes are classified three ways: success, retryable
//! failure, or conflict.
//!
//! ## Key Invariants
//!
//! - One sync pass at a time, regardless of trigger source
//! - Replay is strictly sequential, never speculative or parallel
//! - In-memory state and the durable store agree after every mutation
//! - Terminal operations are pruned at the end of every pass
//! - Replay-time errors are absorbed into operation state, never thrown
//!   across the engine boundary

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod engine;
mod error;
mod events;
mod executor;
mod queue;

pub use config::EngineConfig;
pub use conflict::{ConflictDescriptor, ConflictResolver, ConflictStrategy, MergeFn, StrategyOverride};
pub use engine::{PassOutcome, PassSummary, SyncEngine, SyncStatus};
pub use error::{EngineError, EngineResult};
pub use events::{SyncEvent, SyncFeed};
pub use executor::{ExecutionOutcome, ExecutionRequest, MockExecutor, OperationExecutor};
pub use queue::{OperationQueue, StatusCounts};
