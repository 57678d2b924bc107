//! Integration tests for the offline queue and sync engine.
//!
//! These exercise the full stack — engine, queue, and a file-backed store —
//! the way an application would drive it.

use outbox_core::{Operation, OperationKind, OperationStatus};
use outbox_engine::{
    EngineConfig, ExecutionOutcome, ExecutionRequest, MockExecutor, OperationExecutor, SyncEngine,
    SyncEvent,
};
use outbox_store::{FileStore, OperationStore};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Long enough that automatic triggers never fire inside a manual test.
fn manual_config() -> EngineConfig {
    EngineConfig::new().with_settle_delay(Duration::from_secs(30))
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// An executor that blocks inside each call until the test releases it,
/// for exercising in-flight cancellation and mid-pass connectivity drops.
struct GateExecutor {
    started: Sender<String>,
    release: Mutex<Receiver<()>>,
}

impl GateExecutor {
    fn new() -> (Arc<Self>, Receiver<String>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let executor = Arc::new(Self {
            started: started_tx,
            release: Mutex::new(release_rx),
        });
        (executor, started_rx, release_tx)
    }
}

impl OperationExecutor for GateExecutor {
    fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let _ = self.started.send(request.path.clone());
        let _ = self.release.lock().unwrap().recv();
        ExecutionOutcome::Success
    }
}

#[test]
fn offline_enqueue_then_connect_syncs_and_prunes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.cbor");

    let executor = Arc::new(MockExecutor::new());
    let engine = SyncEngine::new(
        EngineConfig::new().with_settle_delay(Duration::from_millis(20)),
        Box::new(FileStore::open(&path)),
        Arc::clone(&executor),
    );
    let events = engine.subscribe();

    // Offline: the operation is captured, not executed
    let op = engine
        .enqueue(
            Operation::new(
                OperationKind::Update,
                "PATCH",
                "/tasks/42",
                br#"{"status":"completed"}"#.to_vec(),
            )
            .with_resource("task", "42"),
        )
        .unwrap();

    assert!(engine.is_offline());
    let pending = engine.pending_operations();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, OperationStatus::Pending);
    assert_eq!(engine.query("task", "42").len(), 1);
    assert_eq!(executor.request_count(), 0);

    // Connectivity returns; after the settle delay a pass runs
    engine.set_connected(true);
    assert!(wait_until(Duration::from_secs(2), || engine
        .queue()
        .is_empty()));

    // Exactly one replay with the captured target and payload
    let requests = executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "PATCH");
    assert_eq!(requests[0].path, "/tasks/42");
    assert_eq!(requests[0].payload, br#"{"status":"completed"}"#.to_vec());

    assert!(engine.pending_operations().is_empty());
    assert!(engine.last_sync_time().is_some());

    let seen: Vec<_> = events.try_iter().collect();
    assert!(seen.contains(&SyncEvent::ConnectivityChanged { connected: true }));
    assert!(seen.contains(&SyncEvent::SyncStarted { eligible: 1 }));
    assert!(seen.contains(&SyncEvent::OperationSynced { id: op.id }));

    // The pass pruned the completed operation from the log as well
    let loaded = FileStore::open(&path).load();
    assert!(loaded.operations.is_empty());
    assert!(!loaded.degraded);
}

#[test]
fn failed_operations_survive_restart_and_retry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.cbor");
    let op_id;

    {
        let executor = Arc::new(MockExecutor::new());
        executor.push_failure("503 service unavailable");

        let engine = SyncEngine::new(
            manual_config(),
            Box::new(FileStore::open(&path)),
            Arc::clone(&executor),
        );
        engine.set_connected(true);

        let op = engine
            .enqueue(Operation::new(
                OperationKind::Create,
                "POST",
                "/tasks",
                vec![1],
            ))
            .unwrap();
        op_id = op.id;

        let summary = *engine.sync_now().summary().unwrap();
        assert_eq!(summary.failed, 1);
    }

    // Process restart: the failed operation reloads with its diagnostics
    let executor = Arc::new(MockExecutor::new());
    let engine = SyncEngine::new(
        manual_config(),
        Box::new(FileStore::open(&path)),
        Arc::clone(&executor),
    );

    let snapshot = engine.queue().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, op_id);
    assert_eq!(snapshot[0].status, OperationStatus::Failed);
    assert_eq!(snapshot[0].retry_count, 1);
    assert_eq!(
        snapshot[0].last_error.as_deref(),
        Some("503 service unavailable")
    );

    // Still eligible; the next pass drains it
    engine.set_connected(true);
    let summary = *engine.sync_now().summary().unwrap();
    assert_eq!(summary.synced, 1);
    assert!(engine.queue().is_empty());
}

#[test]
fn cancel_during_in_flight_call_discards_result() {
    let dir = tempdir().unwrap();
    let (executor, started, release) = GateExecutor::new();

    let engine = SyncEngine::new(
        manual_config(),
        Box::new(FileStore::open(dir.path().join("queue.cbor"))),
        executor,
    );
    engine.set_connected(true);
    let op = engine
        .enqueue(Operation::new(
            OperationKind::Delete,
            "DELETE",
            "/tasks/7",
            vec![],
        ))
        .unwrap();
    let events = engine.subscribe();

    let worker = {
        let engine = engine.clone();
        thread::spawn(move || engine.sync_now())
    };

    // The call is in flight; cancel does not abort it
    started.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(engine.is_syncing());
    assert!(engine.cancel(op.id).unwrap());

    // The call completes, but its result is discarded
    release.send(()).unwrap();
    let outcome = worker.join().unwrap();
    let summary = *outcome.summary().unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.synced, 0);
    assert_eq!(summary.failed, 0);

    let seen: Vec<_> = events.try_iter().collect();
    assert!(!seen.contains(&SyncEvent::OperationSynced { id: op.id }));

    // Cancelled is terminal, so the end-of-pass prune removed it
    assert!(engine.queue().is_empty());
}

#[test]
fn connectivity_drop_stops_pass_early() {
    let dir = tempdir().unwrap();
    let (executor, started, release) = GateExecutor::new();

    let engine = SyncEngine::new(
        manual_config(),
        Box::new(FileStore::open(dir.path().join("queue.cbor"))),
        executor,
    );
    engine.set_connected(true);
    engine
        .enqueue(Operation::new(OperationKind::Update, "PUT", "/a", vec![]))
        .unwrap();
    let b = engine
        .enqueue(Operation::new(OperationKind::Update, "PUT", "/b", vec![]))
        .unwrap();

    let worker = {
        let engine = engine.clone();
        thread::spawn(move || engine.sync_now())
    };

    // While /a is in flight, connectivity drops
    assert_eq!(
        started.recv_timeout(Duration::from_secs(2)).unwrap(),
        "/a"
    );
    engine.set_connected(false);
    release.send(()).unwrap();

    let outcome = worker.join().unwrap();
    let summary = *outcome.summary().unwrap();

    // /a kept its resulting status; /b was never attempted
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.synced, 1);

    let snapshot = engine.queue().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, b.id);
    assert_eq!(snapshot[0].status, OperationStatus::Pending);
}

#[test]
fn clear_all_resets_queue_and_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.cbor");

    let engine = SyncEngine::new(
        manual_config(),
        Box::new(FileStore::open(&path)),
        MockExecutor::new(),
    );
    engine
        .enqueue(Operation::new(OperationKind::Create, "POST", "/a", vec![]))
        .unwrap();
    engine
        .enqueue(Operation::new(OperationKind::Create, "POST", "/b", vec![]))
        .unwrap();

    engine.clear_all_operations().unwrap();

    assert!(engine.queue().is_empty());
    assert!(FileStore::open(&path).load().operations.is_empty());
}
