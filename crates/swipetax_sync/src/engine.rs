//! Sync engine state machine and session logic.

use crate::config::{Backoff, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::status::{StatusPublisher, SyncState, SyncStatus};
use crate::transport::RemoteStore;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use swipetax_log::{LocalRecords, MutationLog};
use swipetax_protocol::{resolve, Mutation, MutationId, PullRequest, PushRequest, Record};

/// How a sync session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All pushes and the pull succeeded.
    Success,
    /// Some work succeeded, some failed; successful work is kept.
    Partial,
    /// No connectivity; nothing was attempted.
    Offline,
    /// The credential was rejected. The caller must re-authenticate;
    /// affected mutations stay pending.
    AuthExpired,
    /// The session failed without making progress.
    Error,
}

/// Summary of one reconciliation session.
///
/// Owned by the engine for the duration of the session and handed to
/// every caller whose trigger the session absorbed.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// When the session started.
    pub started_at: SystemTime,
    /// Mutations settled with the server (accepted or adjudicated).
    pub pushed: u64,
    /// Remote records applied locally.
    pub pulled: u64,
    /// Conflicts decided by the resolver.
    pub conflicts_resolved: u64,
    /// Push attempts that failed and will retry next session.
    pub push_failures: u64,
    /// How the session ended.
    pub outcome: SessionOutcome,
    /// Error text for failed sessions.
    pub error: Option<String>,
    /// Wall time the session took.
    pub duration: Duration,
}

impl SessionReport {
    fn new(started_at: SystemTime) -> Self {
        Self {
            started_at,
            pushed: 0,
            pulled: 0,
            conflicts_resolved: 0,
            push_failures: 0,
            outcome: SessionOutcome::Error,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the session completed without any failure.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Success)
    }
}

#[derive(Default)]
struct SessionSlot {
    active: bool,
    generation: u64,
    last_report: Option<SessionReport>,
}

struct StateCell {
    state: SyncState,
    entered: Instant,
}

/// The offline-first sync engine.
///
/// One logical instance per process. Local reads and writes go through
/// [`SyncEngine::submit`] and never block on the network; [`SyncEngine::sync`]
/// runs at most one session at a time, coalescing concurrent triggers
/// into the in-progress session.
pub struct SyncEngine<R: RemoteStore> {
    config: SyncConfig,
    remote: Arc<R>,
    log: Arc<MutationLog>,
    records: Arc<LocalRecords>,
    publisher: StatusPublisher,
    online: AtomicBool,
    slot: Mutex<SessionSlot>,
    settled: Condvar,
    backoff: Mutex<Backoff>,
    state: RwLock<StateCell>,
    last_sync_time: RwLock<Option<SystemTime>>,
    last_error: RwLock<Option<String>>,
}

impl<R: RemoteStore> SyncEngine<R> {
    /// Creates an engine over the given remote and local state.
    pub fn new(
        config: SyncConfig,
        remote: R,
        log: Arc<MutationLog>,
        records: Arc<LocalRecords>,
    ) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        let engine = Self {
            config,
            remote: Arc::new(remote),
            log,
            records,
            publisher: StatusPublisher::new(),
            online: AtomicBool::new(true),
            slot: Mutex::new(SessionSlot::default()),
            settled: Condvar::new(),
            backoff: Mutex::new(backoff),
            state: RwLock::new(StateCell {
                state: SyncState::Idle,
                entered: Instant::now(),
            }),
            last_sync_time: RwLock::new(None),
            last_error: RwLock::new(None),
        };
        engine.publish_current();
        engine
    }

    /// The local mutation log.
    pub fn log(&self) -> &Arc<MutationLog> {
        &self.log
    }

    /// The local record store.
    pub fn records(&self) -> &Arc<LocalRecords> {
        &self.records
    }

    /// Current engine state. Terminal states read as [`SyncState::Idle`]
    /// once the settle delay has elapsed.
    pub fn state(&self) -> SyncState {
        let cell = self.state.read();
        if cell.state.is_terminal() && cell.entered.elapsed() >= self.config.settle_delay {
            SyncState::Idle
        } else {
            cell.state
        }
    }

    /// Latest published status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.publisher.current()
    }

    /// Subscribes to status snapshots; returns the current one plus a
    /// receiver for all future transitions.
    pub fn subscribe(&self) -> (SyncStatus, Receiver<SyncStatus>) {
        self.publisher.subscribe()
    }

    /// Records a connectivity change from the host platform.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::debug!(online, "connectivity changed");
            self.publish_current();
        }
    }

    /// Last known connectivity.
    pub fn online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Outcome of the most recently settled session, if any.
    pub fn last_outcome(&self) -> Option<SessionOutcome> {
        self.slot.lock().last_report.as_ref().map(|r| r.outcome)
    }

    /// Returns the next automatic-retry delay and advances the schedule.
    pub fn next_retry_delay(&self) -> Duration {
        self.backoff.lock().next_delay()
    }

    /// Captures a local edit: validates and appends it to the mutation
    /// log, then applies the optimistic record state locally. Returns
    /// without touching the network.
    pub fn submit(&self, mutation: Mutation) -> SyncResult<MutationId> {
        let id = self.log.append(mutation)?;
        if let Some(admitted) = self.log.get(&id) {
            self.records.apply(self.materialize(&admitted))?;
        }
        self.publish_current();
        Ok(id)
    }

    /// Runs (or joins) a sync session and returns its report.
    ///
    /// Blocks until the triggered session settles. If a session is
    /// already running, this call coalesces into it: no second session
    /// is started, and the in-progress session's report is returned once
    /// it settles.
    pub fn sync(&self) -> SessionReport {
        let mut slot = self.slot.lock();
        if slot.active {
            let generation = slot.generation;
            while slot.active && slot.generation == generation {
                self.settled.wait(&mut slot);
            }
            if let Some(report) = slot.last_report.clone() {
                tracing::debug!("sync trigger coalesced into finished session");
                return report;
            }
        }
        slot.active = true;
        drop(slot);

        let report = self.run_session();

        let mut slot = self.slot.lock();
        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.last_report = Some(report.clone());
        self.settled.notify_all();
        report
    }

    fn run_session(&self) -> SessionReport {
        let t0 = Instant::now();
        let mut report = SessionReport::new(SystemTime::now());

        self.set_state(SyncState::Syncing, None);

        if !self.online() {
            tracing::debug!("sync requested while offline, nothing attempted");
            report.outcome = SessionOutcome::Offline;
            report.duration = t0.elapsed();
            self.set_state(SyncState::Offline, None);
            return report;
        }

        let result = self
            .push_phase(&mut report)
            .and_then(|()| self.pull_phase(&mut report));

        report.duration = t0.elapsed();
        match result {
            Ok(()) if report.push_failures == 0 => {
                report.outcome = SessionOutcome::Success;
                self.backoff.lock().reset();
                *self.last_sync_time.write() = Some(SystemTime::now());
                if let Err(err) = self.log.prune(self.config.retention) {
                    tracing::warn!(error = %err, "pruning confirmed mutations failed");
                }
                self.set_state(SyncState::Synced, None);
            }
            Ok(()) => {
                report.outcome = SessionOutcome::Partial;
                let error = format!("{} push attempt(s) failed", report.push_failures);
                report.error = Some(error.clone());
                self.set_state(SyncState::Error, Some(error));
            }
            Err(SyncError::AuthExpired) => {
                report.outcome = SessionOutcome::AuthExpired;
                let error = SyncError::AuthExpired.to_string();
                report.error = Some(error.clone());
                self.set_state(SyncState::Error, Some(error));
            }
            Err(err) => {
                report.outcome = if report.pushed + report.pulled > 0 {
                    SessionOutcome::Partial
                } else {
                    SessionOutcome::Error
                };
                let error = err.to_string();
                report.error = Some(error.clone());
                self.set_state(SyncState::Error, Some(error));
            }
        }

        tracing::info!(
            outcome = ?report.outcome,
            pushed = report.pushed,
            pulled = report.pulled,
            conflicts = report.conflicts_resolved,
            "sync session settled"
        );
        report
    }

    /// Pushes pending mutations in capture order, one attempt each.
    fn push_phase(&self, report: &mut SessionReport) -> SyncResult<()> {
        let pending = self.log.list_pending();
        if pending.is_empty() {
            return Ok(());
        }
        tracing::debug!(count = pending.len(), "pushing pending mutations");

        for mutation in pending {
            self.log.mark_in_flight(&[mutation.id])?;
            let request = PushRequest::new(mutation.clone(), self.config.device_id);

            match self.remote.push(&request) {
                Ok(response) if response.accepted => {
                    self.log.mark_confirmed(&[mutation.id])?;
                    if let Some(server) = response.server_record {
                        self.records.apply(server)?;
                    }
                    report.pushed += 1;
                }
                Ok(response) => match response.server_record {
                    // The server declined: it already holds newer state
                    // for this record. Adjudicate locally and settle the
                    // mutation; retrying a refused write cannot succeed.
                    Some(server) => {
                        let local = self.local_version(&mutation);
                        self.records.apply(resolve(&local, &server))?;
                        self.log.mark_confirmed(&[mutation.id])?;
                        report.conflicts_resolved += 1;
                        report.pushed += 1;
                    }
                    None => {
                        self.log.mark_failed(
                            &[mutation.id],
                            "push rejected without authoritative record",
                        )?;
                        report.push_failures += 1;
                    }
                },
                Err(SyncError::AuthExpired) => {
                    // Not the mutation's fault: back to pending, abort.
                    self.log.release(&[mutation.id])?;
                    return Err(SyncError::AuthExpired);
                }
                Err(err) => {
                    tracing::warn!(mutation = %mutation.id, error = %err, "push attempt failed");
                    self.log.mark_failed(&[mutation.id], &err.to_string())?;
                    report.push_failures += 1;
                }
            }
        }
        Ok(())
    }

    /// Pages through remote changes since the persisted cursor.
    fn pull_phase(&self, report: &mut SessionReport) -> SyncResult<()> {
        loop {
            let cursor = self.records.sync_cursor();
            let request = PullRequest::new(cursor, self.config.pull_batch_size);
            let response = self.remote.pull_since(&request)?;

            let page = response.records.len();
            for remote_record in response.records {
                self.integrate_remote(remote_record, report)?;
                report.pulled += 1;
            }
            self.records.set_sync_cursor(response.next_cursor)?;

            tracing::debug!(page, "applied pull page");
            if !response.has_more {
                return Ok(());
            }
        }
    }

    fn integrate_remote(&self, remote: Record, report: &mut SessionReport) -> SyncResult<()> {
        if self.log.has_unconfirmed(&remote.id) {
            if let Some(local) = self.records.get(&remote.id) {
                let winner = resolve(&local, &remote);
                tracing::debug!(record = %remote.id, kept_local = winner == local, "resolved pull conflict");
                self.records.apply(winner)?;
                report.conflicts_resolved += 1;
                return Ok(());
            }
        }
        self.records.apply(remote)?;
        Ok(())
    }

    /// The local version of a mutation's record, for conflict
    /// adjudication. Falls back to materializing from the mutation when
    /// the record store has no copy.
    fn local_version(&self, mutation: &Mutation) -> Record {
        self.records
            .get(&mutation.record_id)
            .unwrap_or_else(|| self.materialize(mutation))
    }

    fn materialize(&self, mutation: &Mutation) -> Record {
        match &mutation.payload {
            Some(fields) => Record::new(
                mutation.record_id,
                fields.clone(),
                mutation.created_at,
                self.config.device_id,
            ),
            None => Record::tombstone(
                mutation.record_id,
                mutation.created_at,
                self.config.device_id,
            ),
        }
    }

    fn set_state(&self, state: SyncState, error: Option<String>) {
        {
            let mut cell = self.state.write();
            cell.state = state;
            cell.entered = Instant::now();
        }
        *self.last_error.write() = error;
        self.publish_current();
    }

    fn publish_current(&self) {
        let stats = self.log.stats();
        self.publisher.publish(SyncStatus {
            state: self.state(),
            last_sync_time: *self.last_sync_time.read(),
            is_online: self.online(),
            error: self.last_error.read().clone(),
            pending: stats.pending + stats.in_flight + stats.failed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockRemote;
    use swipetax_log::MemoryStore;
    use swipetax_protocol::{Cursor, DeviceId, Fields, MutationState, PullResponse, PushResponse, RecordId};

    fn fields(amount: i64) -> Fields {
        let mut f = Fields::new();
        f.insert("amount".into(), serde_json::json!(amount));
        f
    }

    fn engine() -> SyncEngine<MockRemote> {
        engine_with(MockRemote::new())
    }

    fn engine_with(remote: MockRemote) -> SyncEngine<MockRemote> {
        let log = Arc::new(MutationLog::open(Box::new(MemoryStore::new())).unwrap());
        let records = Arc::new(LocalRecords::open(Box::new(MemoryStore::new())).unwrap());
        let config = SyncConfig::new(DeviceId::generate())
            .with_settle_delay(Duration::from_secs(60));
        SyncEngine::new(config, remote, log, records)
    }

    #[test]
    fn initial_state_is_idle() {
        let engine = engine();
        assert_eq!(engine.state(), SyncState::Idle);
        assert!(engine.last_outcome().is_none());
    }

    #[test]
    fn submit_applies_optimistic_state() {
        let engine = engine();
        let record_id = RecordId::generate();

        engine.submit(Mutation::create(record_id, fields(10))).unwrap();

        let local = engine.records().get(&record_id).unwrap();
        assert_eq!(local.fields, fields(10));
        assert!(!local.deleted);
        assert_eq!(engine.status().pending, 1);
    }

    #[test]
    fn submit_delete_leaves_tombstone() {
        let engine = engine();
        let record_id = RecordId::generate();

        engine.submit(Mutation::create(record_id, fields(10))).unwrap();
        engine.submit(Mutation::delete(record_id)).unwrap();

        let local = engine.records().get(&record_id).unwrap();
        assert!(local.deleted);
        assert!(engine.records().list().is_empty());
    }

    #[test]
    fn offline_sync_attempts_no_network() {
        let engine = engine();
        engine.set_online(false);
        engine.submit(Mutation::create(RecordId::generate(), fields(1))).unwrap();

        let report = engine.sync();

        assert_eq!(report.outcome, SessionOutcome::Offline);
        assert_eq!(engine.remote.total_calls(), 0);
        assert_eq!(engine.state(), SyncState::Offline);
    }

    #[test]
    fn successful_session_confirms_and_settles() {
        let engine = engine();
        let id = engine
            .submit(Mutation::create(RecordId::generate(), fields(5)))
            .unwrap();

        let report = engine.sync();

        assert!(report.succeeded());
        assert_eq!(report.pushed, 1);
        assert_eq!(engine.state(), SyncState::Synced);
        assert_eq!(
            engine.log().get(&id).unwrap().state,
            MutationState::Confirmed
        );
        assert!(engine.status().last_sync_time.is_some());
        assert_eq!(engine.status().pending, 0);
    }

    #[test]
    fn failed_push_marks_failed_and_session_partial() {
        let remote = MockRemote::new();
        remote.enqueue_push(Err(SyncError::network_retryable("reset")));
        let engine = engine_with(remote);

        let id = engine
            .submit(Mutation::create(RecordId::generate(), fields(5)))
            .unwrap();

        let report = engine.sync();

        assert_eq!(report.outcome, SessionOutcome::Partial);
        assert_eq!(report.push_failures, 1);
        assert_eq!(engine.state(), SyncState::Error);
        assert_eq!(engine.log().get(&id).unwrap().state, MutationState::Failed);

        // Next session retries the failed mutation and recovers.
        let report = engine.sync();
        assert!(report.succeeded());
        assert_eq!(
            engine.log().get(&id).unwrap().state,
            MutationState::Confirmed
        );
    }

    #[test]
    fn auth_expiry_leaves_mutation_pending() {
        let remote = MockRemote::new();
        remote.enqueue_push(Err(SyncError::AuthExpired));
        let engine = engine_with(remote);

        let id = engine
            .submit(Mutation::create(RecordId::generate(), fields(5)))
            .unwrap();

        let report = engine.sync();

        assert_eq!(report.outcome, SessionOutcome::AuthExpired);
        assert_eq!(engine.log().get(&id).unwrap().state, MutationState::Pending);
        assert_eq!(
            engine.status().error.as_deref(),
            Some("authentication expired")
        );
        // The pull never ran.
        assert_eq!(engine.remote.pull_calls(), 0);
    }

    #[test]
    fn rejected_push_is_adjudicated_and_settled() {
        let record_id = RecordId::generate();
        let server_device = DeviceId::generate();
        let server = Record::new(record_id, fields(99), u64::MAX, server_device);

        let remote = MockRemote::new();
        remote.enqueue_push(Ok(PushResponse::superseded(server.clone())));
        let engine = engine_with(remote);

        let id = engine.submit(Mutation::create(record_id, fields(1))).unwrap();
        let report = engine.sync();

        assert!(report.succeeded());
        assert_eq!(report.conflicts_resolved, 1);
        assert_eq!(
            engine.log().get(&id).unwrap().state,
            MutationState::Confirmed
        );
        assert_eq!(engine.records().get(&record_id).unwrap(), server);
    }

    #[test]
    fn pull_pages_until_exhausted() {
        let remote = MockRemote::new();
        let r1 = Record::new(RecordId::generate(), fields(1), 1, DeviceId::generate());
        let r2 = Record::new(RecordId::generate(), fields(2), 2, DeviceId::generate());
        remote.enqueue_pull(Ok(PullResponse::new(vec![r1], Cursor::new("c1"), true)));
        remote.enqueue_pull(Ok(PullResponse::new(vec![r2], Cursor::new("c2"), false)));
        let engine = engine_with(remote);

        let report = engine.sync();

        assert!(report.succeeded());
        assert_eq!(report.pulled, 2);
        assert_eq!(engine.remote.pull_calls(), 2);
        assert_eq!(engine.records().sync_cursor(), Cursor::new("c2"));
        assert_eq!(engine.records().list().len(), 2);
    }

    #[test]
    fn settle_delay_returns_to_idle() {
        let log = Arc::new(MutationLog::open(Box::new(MemoryStore::new())).unwrap());
        let records = Arc::new(LocalRecords::open(Box::new(MemoryStore::new())).unwrap());
        let config = SyncConfig::new(DeviceId::generate()).with_settle_delay(Duration::ZERO);
        let engine = SyncEngine::new(config, MockRemote::new(), log, records);

        engine.sync();
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn backoff_resets_on_success() {
        let remote = MockRemote::new();
        remote.enqueue_pull(Err(SyncError::network_retryable("reset")));
        let engine = engine_with(remote);

        let report = engine.sync();
        assert_eq!(report.outcome, SessionOutcome::Error);

        assert_eq!(engine.next_retry_delay(), Duration::from_secs(2));
        assert_eq!(engine.next_retry_delay(), Duration::from_secs(4));

        let report = engine.sync();
        assert!(report.succeeded());
        assert_eq!(engine.next_retry_delay(), Duration::from_secs(2));
    }
}
