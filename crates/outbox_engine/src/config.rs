//! Configuration for the engine.

use crate::conflict::ConflictStrategy;
use std::time::Duration;

/// Configuration for the operation queue and sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of live (non-terminal) operations the queue holds.
    /// Enqueues beyond this are rejected without side effects.
    pub capacity: usize,
    /// Maximum failed replay attempts before an operation stays failed
    /// permanently.
    pub max_retries: u32,
    /// Pause after a connected edge before triggering a sync pass, so the
    /// engine does not thrash on flapping connectivity.
    pub settle_delay: Duration,
    /// Credential attached to every replayed request as the
    /// `Authorization` header value. The engine does not construct
    /// authentication beyond forwarding this.
    pub auth_token: Option<String>,
    /// Conflict strategy applied when no per-conflict override decides.
    pub default_strategy: ConflictStrategy,
}

impl EngineConfig {
    /// Creates a configuration with the default limits.
    pub fn new() -> Self {
        Self {
            capacity: 100,
            max_retries: 3,
            settle_delay: Duration::from_secs(1),
            auth_token: None,
            default_strategy: ConflictStrategy::UseServer,
        }
    }

    /// Sets the live-operation capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the connectivity settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the credential forwarded with every replayed request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the default conflict strategy.
    pub fn with_default_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
