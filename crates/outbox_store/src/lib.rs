//! # Outbox Store
//!
//! Durable persistence for the Outbox operation log.
//!
//! The store is the single source of truth across process restarts: the
//! queue reloads it verbatim on startup and rewrites it after every
//! mutation. Two implementations are provided:
//!
//! - [`FileStore`] — file-backed, written as a single atomic replace so a
//!   concurrent crash can never leave a half-written log behind
//! - [`MemoryStore`] — for tests and ephemeral queues
//!
//! ## Recovery policy
//!
//! [`OperationStore::load`] never fails. A missing file is a clean first
//! run; an unreadable or undecodable file degrades to an empty log with
//! [`LoadedLog::degraded`] set, because losing the offline queue is
//! preferable to refusing to start the application.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use store::{LoadedLog, MemoryStore, OperationStore};
