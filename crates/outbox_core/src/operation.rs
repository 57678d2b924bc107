//! The deferred operation and its status state machine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Returns the current Unix time in milliseconds.
///
/// All persisted timestamps (`created_at`, `synced_at`) use this clock so
/// the log stays portable across restarts and machines.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The kind of change an operation represents.
///
/// Informational: the engine replays every kind identically. The kind is
/// available to the conflict resolver and to callers querying by resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A new resource is created on the server.
    Create,
    /// An existing resource is modified.
    Update,
    /// An existing resource is removed.
    Delete,
    /// Anything else (e.g. an RPC-style endpoint).
    Custom,
}

/// The lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting for its first replay attempt.
    Pending,
    /// A replay attempt is in flight.
    Syncing,
    /// Replayed successfully (or resolved by a conflict strategy). Terminal.
    Completed,
    /// The last replay attempt failed; retryable while budget remains.
    Failed,
    /// Explicitly cancelled by the caller. Terminal.
    Cancelled,
}

impl OperationStatus {
    /// Returns true if this status is terminal (never revisited).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Cancelled)
    }

    /// Returns true if the transition `self -> to` is legal.
    ///
    /// Transitions are one-directional except `Failed -> Syncing` (retry).
    /// Any non-terminal status may move to `Cancelled`.
    pub fn can_transition_to(&self, to: OperationStatus) -> bool {
        use OperationStatus::{Cancelled, Completed, Failed, Pending, Syncing};
        match (*self, to) {
            (Pending, Syncing) | (Pending, Cancelled) => true,
            (Syncing, Completed) | (Syncing, Failed) | (Syncing, Cancelled) => true,
            (Failed, Syncing) | (Failed, Cancelled) => true,
            _ => false,
        }
    }
}

/// One deferred, state-changing request captured for later replay.
///
/// The target (`method` + `path`), `payload`, and `headers` are captured once
/// at enqueue time and never recomputed. The engine treats all three as
/// opaque; only the network-execution collaborator interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,
    /// The kind of change this operation represents.
    pub kind: OperationKind,
    /// HTTP method of the target (opaque to the engine).
    pub method: String,
    /// Endpoint path of the target (opaque to the engine).
    pub path: String,
    /// Request body captured at enqueue time; may be empty.
    pub payload: Vec<u8>,
    /// Request headers captured at enqueue time; may be empty.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
    /// Current lifecycle status.
    pub status: OperationStatus,
    /// Number of failed replay attempts. Monotonic.
    pub retry_count: u32,
    /// Message from the most recent failure. Kept for diagnostics.
    pub last_error: Option<String>,
    /// Time of successful replay, Unix milliseconds. Set exactly once.
    pub synced_at: Option<u64>,
    /// Optional correlation key: the type of the affected resource.
    pub resource_type: Option<String>,
    /// Optional correlation key: the id of the affected resource.
    pub resource_id: Option<String>,
}

impl Operation {
    /// Creates a new pending operation with a fresh id.
    pub fn new(
        kind: OperationKind,
        method: impl Into<String>,
        path: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            method: method.into(),
            path: path.into(),
            payload,
            headers: BTreeMap::new(),
            created_at: unix_millis(),
            status: OperationStatus::Pending,
            retry_count: 0,
            last_error: None,
            synced_at: None,
            resource_type: None,
            resource_id: None,
        }
    }

    /// Sets the captured request headers.
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the resource correlation keys.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Returns true if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if a sync pass may replay this operation.
    ///
    /// Eligible: `Pending`, or `Failed` with retry budget remaining.
    pub fn is_eligible(&self, max_retries: u32) -> bool {
        match self.status {
            OperationStatus::Pending => true,
            OperationStatus::Failed => self.retry_count < max_retries,
            _ => false,
        }
    }

    /// Returns true if both correlation keys match.
    pub fn matches_resource(&self, resource_type: &str, resource_id: &str) -> bool {
        self.resource_type.as_deref() == Some(resource_type)
            && self.resource_id.as_deref() == Some(resource_id)
    }

    /// Returns the size of the captured payload in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}
