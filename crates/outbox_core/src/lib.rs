//! # Outbox Core
//!
//! Operation data model for the Outbox offline queue.
//!
//! This crate defines the unit of deferred work — the [`Operation`] — and
//! its status state machine. It holds no I/O and no synchronization; the
//! store and engine crates build on top of it.
//!
//! ## Key Invariants
//!
//! - Operation ids are unique for the lifetime of a store
//! - `retry_count` is monotonic
//! - Status transitions are one-directional except `Failed -> Syncing`
//! - `Completed` and `Cancelled` are terminal and never revisited

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod operation;

pub use operation::{unix_millis, Operation, OperationKind, OperationStatus};
