//! Sync status publication for the UI layer.
//!
//! The publisher decouples the engine from any UI framework: the host
//! subscribes and receives a fresh snapshot synchronously after every
//! engine state transition. Only the latest snapshot is retained, so a
//! (re)subscriber always sees current state, never history.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::SystemTime;

/// The externally visible state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No session running or settling.
    Idle,
    /// A session is in progress.
    Syncing,
    /// The last session completed fully.
    Synced,
    /// The last session failed (partially or completely).
    Error,
    /// The last session found no connectivity.
    Offline,
}

impl SyncState {
    /// Returns true for the post-session states that settle back to
    /// [`SyncState::Idle`] after the configured delay.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Synced | SyncState::Error | SyncState::Offline)
    }
}

/// Snapshot of sync state published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// Current engine state.
    pub state: SyncState,
    /// Completion time of the last fully successful session.
    pub last_sync_time: Option<SystemTime>,
    /// Last known connectivity.
    pub is_online: bool,
    /// Error text from the last session, if it failed.
    pub error: Option<String>,
    /// Mutations not yet confirmed by the server.
    pub pending: usize,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            last_sync_time: None,
            is_online: false,
            error: None,
            pending: 0,
        }
    }
}

/// Publishes sync status snapshots to any number of subscribers.
pub struct StatusPublisher {
    latest: RwLock<SyncStatus>,
    subscribers: RwLock<Vec<Sender<SyncStatus>>>,
}

impl StatusPublisher {
    /// Creates a publisher with the default (idle) snapshot.
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(SyncStatus::default()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Returns the latest snapshot.
    pub fn current(&self) -> SyncStatus {
        self.latest.read().clone()
    }

    /// Subscribes to status changes.
    ///
    /// Returns the current snapshot plus a receiver for all future
    /// snapshots, so a late subscriber never misses the present state.
    pub fn subscribe(&self) -> (SyncStatus, Receiver<SyncStatus>) {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        (self.current(), rx)
    }

    /// Publishes a new snapshot synchronously.
    ///
    /// Disconnected subscribers are dropped.
    pub fn publish(&self, status: SyncStatus) {
        *self.latest.write() = status.clone();
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
