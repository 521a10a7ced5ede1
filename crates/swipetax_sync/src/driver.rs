//! Background sync driver.
//!
//! The engine itself never sleeps or spawns; this driver owns the one
//! background thread that reacts to triggers and connectivity changes,
//! applying the backoff schedule between automatic retries.

use crate::engine::{SessionOutcome, SyncEngine};
use crate::transport::RemoteStore;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

enum Trigger {
    Sync,
    Connectivity(bool),
    Shutdown,
}

/// Drives an engine from a background thread.
///
/// - [`SyncDriver::trigger`] requests a session (fire and forget; use
///   [`SyncEngine::sync`] directly to block on the report).
/// - [`SyncDriver::set_online`] forwards connectivity signals. After a
///   restore, a session is scheduled automatically: immediately when the
///   engine was healthy, after the capped-exponential backoff delay when
///   the last session failed. An `AuthExpired` session is never retried
///   automatically; the host triggers again after re-authenticating.
///
/// Dropping the driver shuts the thread down.
pub struct SyncDriver {
    tx: Sender<Trigger>,
    handle: Option<JoinHandle<()>>,
}

impl SyncDriver {
    /// Spawns the driver thread for `engine`.
    pub fn spawn<R: RemoteStore + 'static>(engine: Arc<SyncEngine<R>>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("swipetax-sync".into())
            .spawn(move || run_loop(engine, rx))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Requests a sync session.
    pub fn trigger(&self) {
        let _ = self.tx.send(Trigger::Sync);
    }

    /// Forwards a connectivity signal from the host platform.
    pub fn set_online(&self, online: bool) {
        let _ = self.tx.send(Trigger::Connectivity(online));
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        let _ = self.tx.send(Trigger::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop<R: RemoteStore>(engine: Arc<SyncEngine<R>>, rx: Receiver<Trigger>) {
    loop {
        match rx.recv() {
            Err(_) | Ok(Trigger::Shutdown) => break,
            Ok(Trigger::Sync) => {
                engine.sync();
            }
            Ok(Trigger::Connectivity(online)) => {
                engine.set_online(online);
                if !online {
                    continue;
                }
                let Some(delay) = retry_delay(&engine) else {
                    continue;
                };
                // Wait out the backoff, letting newer triggers preempt
                // the schedule.
                match rx.recv_timeout(delay) {
                    Ok(Trigger::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Ok(Trigger::Sync) => {
                        engine.sync();
                    }
                    Ok(Trigger::Connectivity(online)) => {
                        engine.set_online(online);
                        if online {
                            engine.sync();
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if engine.online() {
                            engine.sync();
                        }
                    }
                }
            }
        }
    }
}

/// How long to wait before the connectivity-restored session.
///
/// `None` means no automatic session at all (credential expiry).
fn retry_delay<R: RemoteStore>(engine: &SyncEngine<R>) -> Option<Duration> {
    match engine.last_outcome() {
        Some(SessionOutcome::AuthExpired) => None,
        Some(SessionOutcome::Offline)
        | Some(SessionOutcome::Error)
        | Some(SessionOutcome::Partial) => Some(engine.next_retry_delay()),
        Some(SessionOutcome::Success) | None => Some(Duration::ZERO),
    }
}
