//! Conflict classification and resolution.

use outbox_core::{Operation, OperationKind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// How a conflicting operation is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    /// Re-issue the operation's original payload, overwriting server state.
    UseLocal,
    /// Accept the server's state; mark the operation completed without
    /// reapplying it.
    UseServer,
    /// Delegate to the application-supplied merge function and re-issue the
    /// merged payload. Behaves as `UseServer` when no merge function is
    /// configured.
    Merge,
    /// Do not finalize; emit a conflict-detected event and park the
    /// operation until an external actor resolves it.
    AskUser,
}

impl ConflictStrategy {
    /// Returns true if this strategy resolves without external input.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictStrategy::AskUser)
    }
}

/// Everything a resolution decision gets to see about one conflict.
///
/// Carries the conflicting operation's identity and captured request
/// alongside the server's description of its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDescriptor {
    /// Id of the conflicting operation.
    pub operation_id: Uuid,
    /// The operation's kind.
    pub kind: OperationKind,
    /// HTTP method of the operation's target.
    pub method: String,
    /// Endpoint path of the operation's target.
    pub path: String,
    /// Headers captured at enqueue time.
    pub headers: BTreeMap<String, String>,
    /// The locally captured payload.
    pub local_payload: Vec<u8>,
    /// The payload the server returned describing its current state.
    pub server_payload: Vec<u8>,
    /// Resource correlation key, when the operation carried one.
    pub resource_type: Option<String>,
    /// Resource correlation key, when the operation carried one.
    pub resource_id: Option<String>,
}

impl ConflictDescriptor {
    /// Builds a descriptor for an operation and the server payload that
    /// rejected it.
    pub fn for_operation(operation: &Operation, server_payload: Vec<u8>) -> Self {
        Self {
            operation_id: operation.id,
            kind: operation.kind,
            method: operation.method.clone(),
            path: operation.path.clone(),
            headers: operation.headers.clone(),
            local_payload: operation.payload.clone(),
            server_payload,
            resource_type: operation.resource_type.clone(),
            resource_id: operation.resource_id.clone(),
        }
    }
}

/// Application-supplied merge function: produces the payload to re-issue
/// from a conflict descriptor.
pub type MergeFn = dyn Fn(&ConflictDescriptor) -> Vec<u8> + Send + Sync;

/// Per-conflict strategy override: inspects a descriptor and returns the
/// strategy to apply for that specific conflict.
pub type StrategyOverride = dyn Fn(&ConflictDescriptor) -> ConflictStrategy + Send + Sync;

/// Decides the fate of operations whose replay the server rejected.
///
/// Holds a global default strategy, an optional per-conflict override
/// callback, and an optional merge function. All three are swappable at
/// runtime.
pub struct ConflictResolver {
    default_strategy: RwLock<ConflictStrategy>,
    override_fn: RwLock<Option<Arc<StrategyOverride>>>,
    merge_fn: RwLock<Option<Arc<MergeFn>>>,
}

impl ConflictResolver {
    /// Creates a resolver with the given default strategy.
    pub fn new(default_strategy: ConflictStrategy) -> Self {
        Self {
            default_strategy: RwLock::new(default_strategy),
            override_fn: RwLock::new(None),
            merge_fn: RwLock::new(None),
        }
    }

    /// Returns the global default strategy.
    pub fn default_strategy(&self) -> ConflictStrategy {
        *self.default_strategy.read()
    }

    /// Replaces the global default strategy.
    pub fn set_default_strategy(&self, strategy: ConflictStrategy) {
        *self.default_strategy.write() = strategy;
    }

    /// Installs a per-conflict override callback.
    pub fn set_override<F>(&self, f: F)
    where
        F: Fn(&ConflictDescriptor) -> ConflictStrategy + Send + Sync + 'static,
    {
        *self.override_fn.write() = Some(Arc::new(f));
    }

    /// Removes the per-conflict override callback.
    pub fn clear_override(&self) {
        *self.override_fn.write() = None;
    }

    /// Installs the application merge function.
    pub fn set_merge_fn<F>(&self, f: F)
    where
        F: Fn(&ConflictDescriptor) -> Vec<u8> + Send + Sync + 'static,
    {
        *self.merge_fn.write() = Some(Arc::new(f));
    }

    /// Picks the strategy for one conflict: the override callback when
    /// installed, the global default otherwise.
    pub fn decide(&self, descriptor: &ConflictDescriptor) -> ConflictStrategy {
        let override_fn = self.override_fn.read().clone();
        match override_fn {
            Some(f) => f(descriptor),
            None => self.default_strategy(),
        }
    }

    /// Runs the merge function, if one is installed.
    pub fn merge(&self, descriptor: &ConflictDescriptor) -> Option<Vec<u8>> {
        let merge_fn = self.merge_fn.read().clone();
        merge_fn.map(|f| f(descriptor))
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(ConflictStrategy::UseServer)
    }
}
