//! Network-execution collaborator abstraction.
//!
//! The engine never performs HTTP itself. It hands each replayed operation
//! to an [`OperationExecutor`], which owns the actual request format,
//! timeouts, and transport, and reports back one of three classified
//! outcomes. This allows different implementations (reqwest, ureq, a
//! platform networking layer, or a mock for testing).

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One replayed request, assembled from an operation's captured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// HTTP method.
    pub method: String,
    /// Endpoint path.
    pub path: String,
    /// Request body.
    pub payload: Vec<u8>,
    /// Request headers, including the engine-attached credential.
    pub headers: BTreeMap<String, String>,
}

/// The classified outcome of executing one operation.
///
/// The executor owns classification: transport errors, 5xx responses, and
/// non-conflict 4xx responses are all reported as `Failure`; a precondition
/// rejection (HTTP 409-equivalent) is reported as `Conflict` with whatever
/// payload the server returned to describe its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The server accepted the operation.
    Success,
    /// The attempt failed; the operation is retryable while budget remains.
    Failure {
        /// Human-readable description, recorded as the operation's
        /// `last_error`.
        message: String,
    },
    /// The server considers the operation's precondition violated.
    Conflict {
        /// The server's description of its current state.
        server_payload: Vec<u8>,
    },
}

/// Executes replayed operations against the server.
///
/// Implementations are responsible for their own request timeouts; the
/// engine blocks on each call and never runs two calls concurrently.
pub trait OperationExecutor: Send + Sync {
    /// Performs the request and classifies the result.
    fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome;
}

impl<T: OperationExecutor + ?Sized> OperationExecutor for Arc<T> {
    fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        (**self).execute(request)
    }
}

/// A scripted executor for testing.
///
/// Outcomes are consumed in FIFO order, one per `execute` call; when the
/// script is exhausted every call succeeds. All requests are recorded in
/// invocation order.
#[derive(Debug, Default)]
pub struct MockExecutor {
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl MockExecutor {
    /// Creates a mock that succeeds on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome to the script.
    pub fn push_outcome(&self, outcome: ExecutionOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Appends a failure outcome to the script.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_outcome(ExecutionOutcome::Failure {
            message: message.into(),
        });
    }

    /// Appends a conflict outcome to the script.
    pub fn push_conflict(&self, server_payload: Vec<u8>) {
        self.push_outcome(ExecutionOutcome::Conflict { server_payload });
    }

    /// Returns all requests seen so far, in invocation order.
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the number of `execute` calls seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl OperationExecutor for MockExecutor {
    fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ExecutionOutcome::Success)
    }
}
