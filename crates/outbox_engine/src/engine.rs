//! The sync engine: sequential replay of eligible operations.

use crate::config::EngineConfig;
use crate::conflict::{ConflictDescriptor, ConflictResolver, ConflictStrategy};
use crate::error::{EngineError, EngineResult};
use crate::events::{SyncEvent, SyncFeed};
use crate::executor::{ExecutionOutcome, ExecutionRequest, OperationExecutor};
use crate::queue::OperationQueue;
use outbox_core::{unix_millis, Operation};
use outbox_store::OperationStore;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Header name the engine attaches the configured credential under.
const AUTH_HEADER: &str = "Authorization";

/// Counters for one completed sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Operations actually handed to the executor this pass.
    pub attempted: usize,
    /// Operations that reached `Completed`.
    pub synced: usize,
    /// Operations that recorded a failure.
    pub failed: usize,
    /// Conflicts parked for external resolution.
    pub conflicts: usize,
}

/// The result of a `sync_now` call.
///
/// `Offline` and `AlreadyRunning` are no-ops, not errors: the call simply
/// had nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// A pass ran to its end (possibly cut short by a connectivity drop).
    Completed(PassSummary),
    /// Connectivity is down; no pass was started.
    Offline,
    /// Another pass holds the guard; no pass was started.
    AlreadyRunning,
}

impl PassOutcome {
    /// Returns the summary when a pass actually ran.
    pub fn summary(&self) -> Option<&PassSummary> {
        match self {
            PassOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// A point-in-time summary of the engine for diagnostics or display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Operations waiting for their first replay attempt.
    pub pending: usize,
    /// Operations whose last replay attempt failed.
    pub failed: usize,
    /// True when the connectivity observer last reported disconnected.
    pub offline: bool,
    /// True while a sync pass is running.
    pub syncing: bool,
    /// End time of the most recent pass, Unix milliseconds.
    pub last_sync_time: Option<u64>,
    /// True when the persisted log could not be read at startup and the
    /// queue started empty.
    pub store_degraded: bool,
}

/// What applying a conflict strategy did to the operation.
enum Resolved {
    Synced,
    Failed,
    Parked,
    /// The operation was cancelled or finished before the result landed.
    Discarded,
}

struct EngineInner<E> {
    config: EngineConfig,
    queue: OperationQueue,
    executor: E,
    resolver: ConflictResolver,
    feed: SyncFeed,
    connected: AtomicBool,
    pass_running: AtomicBool,
    settle_generation: AtomicU64,
    progress: RwLock<(usize, usize)>,
    last_sync_time: RwLock<Option<u64>>,
    parked: Mutex<HashMap<Uuid, ConflictDescriptor>>,
}

/// The offline sync engine.
///
/// An explicitly constructed service instance: create one at application
/// start, hand clones to whoever needs it (clones share state), and let it
/// drop at shutdown. There is no global lookup.
///
/// The connectivity observer drives [`SyncEngine::set_connected`]; business
/// code enqueues through [`SyncEngine::enqueue`] and observes progress via
/// [`SyncEngine::subscribe`] or the snapshot accessors.
pub struct SyncEngine<E: OperationExecutor> {
    inner: Arc<EngineInner<E>>,
}

impl<E: OperationExecutor> Clone for SyncEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: OperationExecutor> SyncEngine<E> {
    /// Creates an engine over the given store and executor.
    ///
    /// Reloads any persisted log immediately. The engine starts offline;
    /// the connectivity observer is expected to report the real state soon
    /// after construction.
    pub fn new(config: EngineConfig, store: Box<dyn OperationStore>, executor: E) -> Self {
        let queue = OperationQueue::open(store, config.capacity);
        let resolver = ConflictResolver::new(config.default_strategy);
        Self {
            inner: Arc::new(EngineInner {
                config,
                queue,
                executor,
                resolver,
                feed: SyncFeed::new(),
                connected: AtomicBool::new(false),
                pass_running: AtomicBool::new(false),
                settle_generation: AtomicU64::new(0),
                progress: RwLock::new((0, 0)),
                last_sync_time: RwLock::new(None),
                parked: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the underlying operation queue.
    pub fn queue(&self) -> &OperationQueue {
        &self.inner.queue
    }

    /// Returns the conflict resolver, for installing strategies, overrides,
    /// and merge functions.
    pub fn resolver(&self) -> &ConflictResolver {
        &self.inner.resolver
    }

    /// Subscribes to the engine's event feed.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.inner.feed.subscribe()
    }

    /// Enqueues an operation for later replay. See
    /// [`OperationQueue::enqueue`].
    pub fn enqueue(&self, operation: Operation) -> EngineResult<Operation> {
        self.inner.queue.enqueue(operation)
    }

    /// Cancels a non-terminal operation. See [`OperationQueue::cancel`].
    pub fn cancel(&self, id: Uuid) -> EngineResult<bool> {
        self.inner.queue.cancel(id)
    }

    /// Returns pending operations for a resource. See
    /// [`OperationQueue::query`].
    pub fn query(&self, resource_type: &str, resource_id: &str) -> Vec<Operation> {
        self.inner.queue.query(resource_type, resource_id)
    }

    /// Returns a snapshot of pending operations, in insertion order.
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.inner.queue.pending()
    }

    /// Removes completed and cancelled operations from the queue.
    pub fn clear_completed_operations(&self) -> EngineResult<usize> {
        self.inner.queue.prune_terminal()
    }

    /// Unconditionally empties the queue (account logout / test reset).
    pub fn clear_all_operations(&self) -> EngineResult<()> {
        self.inner.queue.clear_all()
    }

    /// Returns true when the connectivity observer last reported
    /// disconnected.
    pub fn is_offline(&self) -> bool {
        !self.inner.connected.load(Ordering::SeqCst)
    }

    /// Returns true while a sync pass is running.
    pub fn is_syncing(&self) -> bool {
        self.inner.pass_running.load(Ordering::SeqCst)
    }

    /// Returns progress through the current (or most recent) pass's
    /// eligible set, 0.0–1.0.
    pub fn sync_progress(&self) -> f64 {
        let (completed, total) = *self.inner.progress.read();
        if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        }
    }

    /// Returns the end time of the most recent pass, Unix milliseconds.
    pub fn last_sync_time(&self) -> Option<u64> {
        *self.inner.last_sync_time.read()
    }

    /// Returns a point-in-time status summary.
    pub fn sync_status(&self) -> SyncStatus {
        let counts = self.inner.queue.status_counts();
        SyncStatus {
            pending: counts.pending,
            failed: counts.failed,
            offline: self.is_offline(),
            syncing: self.is_syncing(),
            last_sync_time: self.last_sync_time(),
            store_degraded: self.inner.queue.was_degraded(),
        }
    }

    /// Feeds a connectivity transition into the engine.
    ///
    /// A disconnected→connected edge schedules a sync pass after the
    /// configured settle delay; a newer transition (either direction)
    /// invalidates the pending trigger, so flapping connectivity never
    /// stacks passes. Repeated reports of the same state are ignored.
    pub fn set_connected(&self, connected: bool)
    where
        E: 'static,
    {
        let was = self.inner.connected.swap(connected, Ordering::SeqCst);
        if was == connected {
            return;
        }

        let generation = self.inner.settle_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .feed
            .emit(SyncEvent::ConnectivityChanged { connected });
        debug!(connected, "connectivity transition");

        if connected {
            let inner = Arc::clone(&self.inner);
            let delay = self.inner.config.settle_delay;
            thread::spawn(move || {
                thread::sleep(delay);
                let still_current =
                    inner.settle_generation.load(Ordering::SeqCst) == generation;
                if still_current && inner.connected.load(Ordering::SeqCst) {
                    inner.sync_now();
                }
            });
        }
    }

    /// Runs a sync pass now, if one can start.
    ///
    /// No-op (`Offline` / `AlreadyRunning`) when disconnected or when
    /// another pass holds the guard.
    pub fn sync_now(&self) -> PassOutcome {
        self.inner.sync_now()
    }

    /// Finalizes a parked conflict with a concrete strategy.
    ///
    /// Resolving with [`ConflictStrategy::AskUser`] re-parks the conflict.
    /// Returns [`EngineError::UnknownConflict`] when no conflict is parked
    /// for the id.
    pub fn resolve_conflict(&self, id: Uuid, strategy: ConflictStrategy) -> EngineResult<()> {
        let descriptor = self
            .inner
            .parked
            .lock()
            .remove(&id)
            .ok_or(EngineError::UnknownConflict { id })?;

        if strategy == ConflictStrategy::AskUser {
            self.inner.parked.lock().insert(id, descriptor);
            return Ok(());
        }

        self.inner.apply_strategy(descriptor, strategy)?;
        Ok(())
    }

    /// Returns the ids of conflicts currently awaiting external resolution.
    pub fn parked_conflicts(&self) -> Vec<Uuid> {
        self.inner.parked.lock().keys().copied().collect()
    }
}

impl<E: OperationExecutor> EngineInner<E> {
    fn sync_now(&self) -> PassOutcome {
        if !self.connected.load(Ordering::SeqCst) {
            return PassOutcome::Offline;
        }
        if self.pass_running.swap(true, Ordering::SeqCst) {
            return PassOutcome::AlreadyRunning;
        }

        let summary = self.run_pass();
        self.pass_running.store(false, Ordering::SeqCst);
        PassOutcome::Completed(summary)
    }

    fn run_pass(&self) -> PassSummary {
        let eligible = self.queue.eligible_ids(self.config.max_retries);
        let total = eligible.len();
        *self.progress.write() = (0, total);
        self.feed.emit(SyncEvent::SyncStarted { eligible: total });
        debug!(eligible = total, "sync pass started");

        let mut summary = PassSummary::default();
        for id in eligible {
            if !self.connected.load(Ordering::SeqCst) {
                debug!("connectivity lost mid-pass, stopping early");
                break;
            }

            let operation = match self.queue.begin_sync(id) {
                Ok(Some(operation)) => operation,
                Ok(None) => {
                    // Cancelled or finished since the eligible set was taken
                    self.bump_progress();
                    continue;
                }
                Err(e) => {
                    warn!(%id, error = %e, "persist failed, aborting pass");
                    break;
                }
            };

            summary.attempted += 1;
            let request = self.make_request(
                &operation.method,
                &operation.path,
                &operation.payload,
                &operation.headers,
            );
            let outcome = self.executor.execute(&request);
            let applied = match outcome {
                ExecutionOutcome::Success => self.finish_success(id),
                ExecutionOutcome::Failure { message } => self.finish_failure(id, &message),
                ExecutionOutcome::Conflict { server_payload } => {
                    let descriptor = ConflictDescriptor::for_operation(&operation, server_payload);
                    let strategy = self.resolver.decide(&descriptor);
                    self.apply_strategy(descriptor, strategy)
                }
            };

            match applied {
                Ok(Resolved::Synced) => summary.synced += 1,
                Ok(Resolved::Failed) => summary.failed += 1,
                Ok(Resolved::Parked) => summary.conflicts += 1,
                Ok(Resolved::Discarded) => {}
                Err(e) => {
                    warn!(%id, error = %e, "persist failed, aborting pass");
                    break;
                }
            }
            self.bump_progress();
        }

        *self.last_sync_time.write() = Some(unix_millis());
        match self.queue.prune_terminal() {
            Ok(removed) if removed > 0 => debug!(removed, "pruned terminal operations"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to prune terminal operations"),
        }

        self.feed.emit(SyncEvent::SyncFinished {
            synced: summary.synced,
            failed: summary.failed,
            conflicts: summary.conflicts,
        });
        info!(
            attempted = summary.attempted,
            synced = summary.synced,
            failed = summary.failed,
            conflicts = summary.conflicts,
            "sync pass finished"
        );
        summary
    }

    fn bump_progress(&self) {
        let (completed, total) = {
            let mut progress = self.progress.write();
            progress.0 += 1;
            *progress
        };
        self.feed.emit(SyncEvent::Progress { completed, total });
    }

    fn make_request(
        &self,
        method: &str,
        path: &str,
        payload: &[u8],
        headers: &BTreeMap<String, String>,
    ) -> ExecutionRequest {
        let mut headers = headers.clone();
        if let Some(token) = &self.config.auth_token {
            headers.insert(AUTH_HEADER.to_string(), token.clone());
        }
        ExecutionRequest {
            method: method.to_string(),
            path: path.to_string(),
            payload: payload.to_vec(),
            headers,
        }
    }

    fn finish_success(&self, id: Uuid) -> EngineResult<Resolved> {
        if self.queue.record_success(id)? {
            self.feed.emit(SyncEvent::OperationSynced { id });
            Ok(Resolved::Synced)
        } else {
            Ok(Resolved::Discarded)
        }
    }

    fn finish_failure(&self, id: Uuid, message: &str) -> EngineResult<Resolved> {
        if self.queue.record_failure(id, message)? {
            self.feed.emit(SyncEvent::OperationFailed {
                id,
                error: message.to_string(),
            });
            Ok(Resolved::Failed)
        } else {
            Ok(Resolved::Discarded)
        }
    }

    fn apply_strategy(
        &self,
        descriptor: ConflictDescriptor,
        strategy: ConflictStrategy,
    ) -> EngineResult<Resolved> {
        debug!(id = %descriptor.operation_id, ?strategy, "resolving conflict");
        match strategy {
            ConflictStrategy::UseServer => self.finish_success(descriptor.operation_id),
            ConflictStrategy::UseLocal => {
                let payload = descriptor.local_payload.clone();
                self.reissue(&descriptor, payload)
            }
            ConflictStrategy::Merge => match self.resolver.merge(&descriptor) {
                Some(merged) => self.reissue(&descriptor, merged),
                // No merge function installed
                None => self.finish_success(descriptor.operation_id),
            },
            ConflictStrategy::AskUser => {
                let id = descriptor.operation_id;
                self.feed.emit(SyncEvent::ConflictDetected(descriptor.clone()));
                self.parked.lock().insert(id, descriptor);
                Ok(Resolved::Parked)
            }
        }
    }

    /// Second round trip for `UseLocal` and `Merge`: re-issue the chosen
    /// payload against the operation's original target.
    fn reissue(&self, descriptor: &ConflictDescriptor, payload: Vec<u8>) -> EngineResult<Resolved> {
        let request = self.make_request(
            &descriptor.method,
            &descriptor.path,
            &payload,
            &descriptor.headers,
        );
        match self.executor.execute(&request) {
            ExecutionOutcome::Success => self.finish_success(descriptor.operation_id),
            ExecutionOutcome::Failure { message } => {
                self.finish_failure(descriptor.operation_id, &message)
            }
            // A second conflict is recorded as a bounded, retryable failure
            // rather than resolved again, so the pair cannot loop.
            ExecutionOutcome::Conflict { .. } => self.finish_failure(
                descriptor.operation_id,
                "conflict persisted after re-issue",
            ),
        }
    }
}
