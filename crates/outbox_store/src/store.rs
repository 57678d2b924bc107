//! The operation store trait and its in-memory implementation.

use crate::error::{StoreError, StoreResult};
use outbox_core::Operation;
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;

/// The result of loading a persisted operation log.
#[derive(Debug, Clone, Default)]
pub struct LoadedLog {
    /// The reloaded operations, in their persisted order.
    pub operations: Vec<Operation>,
    /// True when an existing log could not be read or decoded and history
    /// was dropped. A missing or empty file is a clean first run, not
    /// degradation.
    pub degraded: bool,
}

impl LoadedLog {
    /// A clean, empty log (first run).
    pub fn empty() -> Self {
        Self::default()
    }

    /// An empty log recovered from an unreadable or corrupt file.
    pub fn recovered() -> Self {
        Self {
            operations: Vec::new(),
            degraded: true,
        }
    }
}

/// Persists the full operation list and reloads it on startup.
///
/// `save` receives the complete list after every queue mutation; callers
/// serialize saves externally (the queue holds its mutation lock across the
/// write), so implementations never see interleaved writes.
pub trait OperationStore: Send {
    /// Reads the persisted log. Never fails; see [`LoadedLog::degraded`].
    fn load(&self) -> LoadedLog;

    /// Serializes and durably writes the full operation list.
    fn save(&mut self, operations: &[Operation]) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    operations: Vec<Operation>,
    degraded: bool,
    save_count: usize,
    fail_writes: bool,
}

/// An in-memory operation store.
///
/// Suitable for unit tests and ephemeral queues. Cloning shares the
/// underlying state, so a test can hand one handle to the queue and keep
/// another to inspect saved state or inject write failures.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with operations.
    ///
    /// Useful for testing reload and recovery scenarios.
    pub fn with_operations(operations: Vec<Operation>) -> Self {
        let store = Self::new();
        store.inner.write().operations = operations;
        store
    }

    /// Creates a store whose load reports a degraded (recovered) log.
    pub fn degraded() -> Self {
        let store = Self::new();
        store.inner.write().degraded = true;
        store
    }

    /// Returns a copy of the most recently saved operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.inner.read().operations.clone()
    }

    /// Returns how many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.inner.read().save_count
    }

    /// Makes subsequent saves fail, for exercising rollback paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.write().fail_writes = fail;
    }
}

impl OperationStore for MemoryStore {
    fn load(&self) -> LoadedLog {
        let inner = self.inner.read();
        LoadedLog {
            operations: inner.operations.clone(),
            degraded: inner.degraded,
        }
    }

    fn save(&mut self, operations: &[Operation]) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.fail_writes {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated write failure",
            )));
        }
        inner.operations = operations.to_vec();
        inner.save_count += 1;
        Ok(())
    }
}
