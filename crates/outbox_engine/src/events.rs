//! Event feed for observing engine activity.
//!
//! The feed distributes state-change events to any number of subscribers,
//! preserving emission order per subscriber. UI code binds here instead of
//! polling observable fields.

use crate::conflict::ConflictDescriptor;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

/// A state-change event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The connectivity observer reported a transition.
    ConnectivityChanged {
        /// The new connectivity state.
        connected: bool,
    },
    /// A sync pass began.
    SyncStarted {
        /// Number of operations in the pass's eligible set.
        eligible: usize,
    },
    /// An operation was replayed successfully (or resolved to completed).
    OperationSynced {
        /// The operation id.
        id: Uuid,
    },
    /// A replay attempt failed; the operation may retry on a later pass.
    OperationFailed {
        /// The operation id.
        id: Uuid,
        /// The failure message recorded on the operation.
        error: String,
    },
    /// A conflict was detected and awaits external resolution.
    ConflictDetected(ConflictDescriptor),
    /// Progress through the current pass's eligible set.
    Progress {
        /// Operations processed so far this pass.
        completed: usize,
        /// Size of the eligible set at pass start.
        total: usize,
    },
    /// A sync pass ended.
    SyncFinished {
        /// Operations that reached `Completed` this pass.
        synced: usize,
        /// Operations that recorded a failure this pass.
        failed: usize,
        /// Conflicts parked for external resolution this pass.
        conflicts: usize,
    },
}

/// Distributes [`SyncEvent`]s to subscribers.
///
/// Subscribers that drop their receiver are cleaned up on the next emit.
#[derive(Default)]
pub struct SyncFeed {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
}

impl SyncFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers, dropping disconnected ones.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn emit_and_receive() {
        let feed = SyncFeed::new();
        let rx = feed.subscribe();

        feed.emit(SyncEvent::SyncStarted { eligible: 3 });

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, SyncEvent::SyncStarted { eligible: 3 });
    }

    #[test]
    fn multiple_subscribers() {
        let feed = SyncFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        let event = SyncEvent::Progress {
            completed: 1,
            total: 2,
        };
        feed.emit(event.clone());

        assert_eq!(rx1.recv().unwrap(), event);
        assert_eq!(rx2.recv().unwrap(), event);
    }

    #[test]
    fn order_preserved() {
        let feed = SyncFeed::new();
        let rx = feed.subscribe();

        feed.emit(SyncEvent::SyncStarted { eligible: 1 });
        feed.emit(SyncEvent::Progress {
            completed: 1,
            total: 1,
        });
        feed.emit(SyncEvent::SyncFinished {
            synced: 1,
            failed: 0,
            conflicts: 0,
        });

        assert_eq!(rx.recv().unwrap(), SyncEvent::SyncStarted { eligible: 1 });
        assert_eq!(
            rx.recv().unwrap(),
            SyncEvent::Progress {
                completed: 1,
                total: 1
            }
        );
        assert_eq!(
            rx.recv().unwrap(),
            SyncEvent::SyncFinished {
                synced: 1,
                failed: 0,
                conflicts: 0
            }
        );
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = SyncFeed::new();
        assert_eq!(feed.subscriber_count(), 0);

        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(SyncEvent::SyncStarted { eligible: 0 });
        assert_eq!(feed.subscriber_count(), 0);
    }
}
