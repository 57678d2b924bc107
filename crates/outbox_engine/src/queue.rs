//! The authoritative in-memory operation queue.
//!
//! All state — the operation list and the boxed store — lives behind one
//! mutex, so no mutation runs concurrently with another mutation or with a
//! save. Every mutating method persists the full list before acknowledging
//! and rolls the in-memory change back if the write fails, keeping memory
//! and disk in agreement at all times.

use crate::error::{EngineError, EngineResult};
use outbox_core::{unix_millis, Operation, OperationStatus};
use outbox_store::{OperationStore, StoreResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Tallies of live operations by status, for status summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Operations waiting for their first replay attempt.
    pub pending: usize,
    /// Operations whose last replay attempt failed.
    pub failed: usize,
}

struct QueueInner {
    operations: Vec<Operation>,
    store: Box<dyn OperationStore>,
}

impl QueueInner {
    fn persist(&mut self) -> StoreResult<()> {
        let QueueInner { operations, store } = self;
        store.save(operations)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.operations.iter().position(|op| op.id == id)
    }
}

/// The capacity-bounded, write-through operation queue.
///
/// Owns the operation list and the durable store exclusively; the engine
/// requests all mutations through this API.
pub struct OperationQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
    degraded: AtomicBool,
}

impl OperationQueue {
    /// Opens the queue, reloading any persisted log from the store.
    ///
    /// Operations persisted as `Syncing` were interrupted mid-replay by a
    /// crash; they are normalized back to `Pending` so they re-enter the
    /// eligible set.
    pub fn open(store: Box<dyn OperationStore>, capacity: usize) -> Self {
        let loaded = store.load();
        if loaded.degraded {
            warn!("operation log recovered as empty; offline history was lost");
        }

        let mut operations = loaded.operations;
        for op in &mut operations {
            if op.status == OperationStatus::Syncing {
                debug!(id = %op.id, "normalizing interrupted operation to pending");
                op.status = OperationStatus::Pending;
            }
        }

        Self {
            inner: Mutex::new(QueueInner { operations, store }),
            capacity,
            degraded: AtomicBool::new(loaded.degraded),
        }
    }

    /// Returns true if the persisted log could not be read at open and the
    /// queue started empty.
    pub fn was_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Returns the configured live-operation capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a new operation and persists it.
    ///
    /// The operation is stored in a fresh pending state regardless of what
    /// the caller left in its mutable fields. Rejected without side effects
    /// when the queue already holds `capacity` live operations.
    pub fn enqueue(&self, mut operation: Operation) -> EngineResult<Operation> {
        operation.status = OperationStatus::Pending;
        operation.retry_count = 0;
        operation.last_error = None;
        operation.synced_at = None;

        let mut inner = self.inner.lock();
        let live = inner.operations.iter().filter(|op| !op.is_terminal()).count();
        if live >= self.capacity {
            return Err(EngineError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        inner.operations.push(operation.clone());
        if let Err(e) = inner.persist() {
            inner.operations.pop();
            return Err(e.into());
        }
        Ok(operation)
    }

    /// Cancels a non-terminal operation and persists.
    ///
    /// Returns `Ok(false)` (a no-op, not an error) when the operation does
    /// not exist or is already terminal.
    pub fn cancel(&self, id: Uuid) -> EngineResult<bool> {
        let mut inner = self.inner.lock();
        let Some(idx) = inner.position(id) else {
            return Ok(false);
        };
        if inner.operations[idx].is_terminal() {
            return Ok(false);
        }

        let previous = inner.operations[idx].status;
        inner.operations[idx].status = OperationStatus::Cancelled;
        if let Err(e) = inner.persist() {
            inner.operations[idx].status = previous;
            return Err(e.into());
        }
        Ok(true)
    }

    /// Returns pending operations matching both resource keys, in
    /// insertion order.
    pub fn query(&self, resource_type: &str, resource_id: &str) -> Vec<Operation> {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| {
                op.status == OperationStatus::Pending
                    && op.matches_resource(resource_type, resource_id)
            })
            .cloned()
            .collect()
    }

    /// Returns a snapshot of every operation, in insertion order.
    pub fn snapshot(&self) -> Vec<Operation> {
        self.inner.lock().operations.clone()
    }

    /// Returns a snapshot of pending operations, in insertion order.
    pub fn pending(&self) -> Vec<Operation> {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .cloned()
            .collect()
    }

    /// Returns the total number of operations, terminal included.
    pub fn len(&self) -> usize {
        self.inner.lock().operations.len()
    }

    /// Returns true if the queue holds no operations at all.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().operations.is_empty()
    }

    /// Returns the number of live (non-terminal) operations.
    pub fn live_count(&self) -> usize {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| !op.is_terminal())
            .count()
    }

    /// Returns pending/failed tallies for status summaries.
    pub fn status_counts(&self) -> StatusCounts {
        let inner = self.inner.lock();
        let mut counts = StatusCounts::default();
        for op in &inner.operations {
            match op.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::Failed => counts.failed += 1,
                _ => {}
            }
        }
        counts
    }

    /// Returns the ids of operations eligible for replay, in insertion
    /// order: pending, or failed with retry budget remaining.
    pub fn eligible_ids(&self, max_retries: u32) -> Vec<Uuid> {
        self.inner
            .lock()
            .operations
            .iter()
            .filter(|op| op.is_eligible(max_retries))
            .map(|op| op.id)
            .collect()
    }

    /// Removes all completed and cancelled operations and persists.
    ///
    /// Returns the number of operations removed.
    pub fn prune_terminal(&self) -> EngineResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.operations.clone();
        inner.operations.retain(|op| !op.is_terminal());
        let removed = before.len() - inner.operations.len();
        if removed == 0 {
            return Ok(0);
        }
        if let Err(e) = inner.persist() {
            inner.operations = before;
            return Err(e.into());
        }
        Ok(removed)
    }

    /// Unconditionally empties the queue and persists.
    ///
    /// For account logout and test reset only.
    pub fn clear_all(&self) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        let before = std::mem::take(&mut inner.operations);
        if let Err(e) = inner.persist() {
            inner.operations = before;
            return Err(e.into());
        }
        Ok(())
    }

    /// Marks an eligible operation as syncing and persists, returning a
    /// clone for execution.
    ///
    /// Returns `Ok(None)` when the operation no longer exists or can no
    /// longer enter `Syncing` (cancelled or finished since the eligible
    /// set was captured).
    pub fn begin_sync(&self, id: Uuid) -> EngineResult<Option<Operation>> {
        let mut inner = self.inner.lock();
        let Some(idx) = inner.position(id) else {
            return Ok(None);
        };
        let previous = inner.operations[idx].status;
        if !previous.can_transition_to(OperationStatus::Syncing) {
            return Ok(None);
        }

        inner.operations[idx].status = OperationStatus::Syncing;
        if let Err(e) = inner.persist() {
            inner.operations[idx].status = previous;
            return Err(e.into());
        }
        Ok(Some(inner.operations[idx].clone()))
    }

    /// Records a successful replay: `Syncing -> Completed`, sets
    /// `synced_at`, persists.
    ///
    /// Returns `Ok(false)` when the result was discarded because the
    /// operation is no longer syncing — a cancel issued while the call was
    /// in flight wins over the call's result.
    pub fn record_success(&self, id: Uuid) -> EngineResult<bool> {
        let mut inner = self.inner.lock();
        let Some(idx) = inner.position(id) else {
            return Ok(false);
        };
        let previous = inner.operations[idx].clone();
        if previous.status != OperationStatus::Syncing {
            return Ok(false);
        }

        inner.operations[idx].status = OperationStatus::Completed;
        inner.operations[idx].synced_at = Some(unix_millis());
        if let Err(e) = inner.persist() {
            inner.operations[idx] = previous;
            return Err(e.into());
        }
        Ok(true)
    }

    /// Records a failed replay: `Syncing -> Failed`, bumps `retry_count`,
    /// stores the message as `last_error`, persists.
    ///
    /// Returns `Ok(false)` when the result was discarded (see
    /// [`OperationQueue::record_success`]).
    pub fn record_failure(&self, id: Uuid, message: &str) -> EngineResult<bool> {
        let mut inner = self.inner.lock();
        let Some(idx) = inner.position(id) else {
            return Ok(false);
        };
        let previous = inner.operations[idx].clone();
        if previous.status != OperationStatus::Syncing {
            return Ok(false);
        }

        inner.operations[idx].status = OperationStatus::Failed;
        inner.operations[idx].retry_count += 1;
        inner.operations[idx].last_error = Some(message.to_string());
        if let Err(e) = inner.persist() {
            inner.operations[idx] = previous;
            return Err(e.into());
        }
        Ok(true)
    }
}
