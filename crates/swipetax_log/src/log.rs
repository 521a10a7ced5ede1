//! The local mutation log.

use crate::error::{LogError, LogResult};
use crate::journal::{decode_lines, encode_line, LogEntry};
use crate::store::LogStore;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use swipetax_protocol::{LogicalClock, Mutation, MutationId, MutationOp, MutationState, RecordId};

const LOCK_STRIPES: usize = 16;

/// Striped per-record locks.
///
/// Holding a record's stripe across an admission or transition serializes
/// writers for that record while letting unrelated records proceed.
struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    fn new() -> Self {
        Self {
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe_of(&self, record_id: &RecordId) -> usize {
        let mut hasher = DefaultHasher::new();
        record_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.stripes.len()
    }

    fn lock_record(&self, record_id: &RecordId) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(record_id)].lock()
    }

    /// Locks the stripes covering `record_ids`, in stripe order so
    /// concurrent multi-record transitions cannot deadlock.
    fn lock_records(&self, record_ids: &[RecordId]) -> Vec<MutexGuard<'_, ()>> {
        let mut indices: Vec<usize> = record_ids.iter().map(|id| self.stripe_of(id)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|i| self.stripes[i].lock()).collect()
    }
}

#[derive(Default)]
struct LogIndex {
    by_id: HashMap<MutationId, Mutation>,
    by_record: HashMap<RecordId, Vec<MutationId>>,
    order: Vec<MutationId>,
}

impl LogIndex {
    fn insert(&mut self, mutation: Mutation) {
        self.by_record
            .entry(mutation.record_id)
            .or_default()
            .push(mutation.id);
        self.order.push(mutation.id);
        self.by_id.insert(mutation.id, mutation);
    }

    fn remove(&mut self, id: &MutationId) {
        if let Some(mutation) = self.by_id.remove(id) {
            if let Some(ids) = self.by_record.get_mut(&mutation.record_id) {
                ids.retain(|m| m != id);
                if ids.is_empty() {
                    self.by_record.remove(&mutation.record_id);
                }
            }
            self.order.retain(|m| m != id);
        }
    }
}

/// Per-state counts of the mutations currently in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    /// Mutations waiting for their first push attempt.
    pub pending: usize,
    /// Mutations picked up by the current sync session.
    pub in_flight: usize,
    /// Server-acknowledged mutations awaiting pruning.
    pub confirmed: usize,
    /// Mutations whose last push attempt failed.
    pub failed: usize,
}

impl LogStats {
    /// Total mutations in the log.
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.confirmed + self.failed
    }
}

/// Append-only record of pending local changes awaiting confirmation.
///
/// The log exclusively owns its mutations: the UI appends, the sync
/// engine drains and transitions, and nothing else writes. Every
/// admission and transition is journaled before the call returns, so the
/// log survives process restarts.
pub struct MutationLog {
    index: RwLock<LogIndex>,
    store: Mutex<Box<dyn LogStore>>,
    locks: StripedLocks,
    clock: LogicalClock,
}

impl MutationLog {
    /// Opens a log, replaying the store's journal.
    pub fn open(mut store: Box<dyn LogStore>) -> LogResult<Self> {
        let lines = store.load()?;
        let entries: Vec<LogEntry> = decode_lines(&lines)?;

        let mut index = LogIndex::default();
        let mut max_created_at = 0;
        for entry in entries {
            match entry {
                LogEntry::Append { mutation } => {
                    max_created_at = max_created_at.max(mutation.created_at);
                    index.insert(mutation);
                }
                LogEntry::Mark { ids, state, reason } => {
                    for id in ids {
                        if let Some(mutation) = index.by_id.get_mut(&id) {
                            if admissible(mutation.state, state) {
                                apply_transition(mutation, state, reason.as_deref());
                            }
                        }
                    }
                }
                LogEntry::Prune { cutoff } => {
                    let doomed = prunable(&index, cutoff);
                    for id in doomed {
                        index.remove(&id);
                    }
                }
            }
        }

        let live = index.order.len();
        let log = Self {
            index: RwLock::new(index),
            store: Mutex::new(store),
            locks: StripedLocks::new(),
            clock: LogicalClock::starting_after(max_created_at),
        };

        // Compact when replay shows the journal is mostly dead weight.
        if lines.len() > live * 2 + 16 {
            log.compact()?;
        }

        Ok(log)
    }

    /// Admits a new local mutation.
    ///
    /// Assigns `created_at` from the log's monotonic clock and forces the
    /// state to `Pending`. Rejects malformed mutations with
    /// [`LogError::InvalidMutation`] before anything is journaled.
    pub fn append(&self, mut mutation: Mutation) -> LogResult<MutationId> {
        validate(&mutation)?;

        mutation.created_at = self.clock.next();
        mutation.state = MutationState::Pending;
        mutation.last_error = None;

        let _guard = self.locks.lock_record(&mutation.record_id);
        let line = encode_line(&LogEntry::Append {
            mutation: mutation.clone(),
        })?;

        let id = mutation.id;
        self.index.write().insert(mutation);
        self.store.lock().append_line(&line)?;

        tracing::debug!(mutation = %id, "mutation admitted");
        Ok(id)
    }

    /// Returns mutations awaiting a push (`Pending` or `Failed`), in
    /// `created_at` order. This is FIFO replay order: edits to the same
    /// record reach the server in the order they were made.
    pub fn list_pending(&self) -> Vec<Mutation> {
        let index = self.index.read();
        let mut pending: Vec<Mutation> = index
            .by_id
            .values()
            .filter(|m| m.state.needs_push())
            .cloned()
            .collect();
        // created_at values are unique (one monotonic clock per log), so
        // this is a total order.
        pending.sort_by_key(|m| m.created_at);
        pending
    }

    /// Marks mutations as picked up by a sync session.
    pub fn mark_in_flight(&self, ids: &[MutationId]) -> LogResult<()> {
        self.transition(ids, MutationState::InFlight, None)
    }

    /// Marks mutations as acknowledged by the server.
    ///
    /// Idempotent: confirming an already-confirmed mutation is a no-op.
    pub fn mark_confirmed(&self, ids: &[MutationId]) -> LogResult<()> {
        self.transition(ids, MutationState::Confirmed, None)
    }

    /// Records a failed push attempt. The mutation becomes eligible for
    /// retry in the next session.
    pub fn mark_failed(&self, ids: &[MutationId], reason: &str) -> LogResult<()> {
        self.transition(ids, MutationState::Failed, Some(reason))
    }

    /// Returns in-flight mutations to `Pending` without recording a
    /// failure. Used when a session aborts for reasons unrelated to the
    /// mutations themselves (e.g. an expired credential).
    pub fn release(&self, ids: &[MutationId]) -> LogResult<()> {
        self.transition(ids, MutationState::Pending, None)
    }

    /// Deletes confirmed mutations older than `older_than`, then compacts
    /// the journal. Pending, in-flight and failed mutations are never
    /// pruned. Returns the number of mutations removed.
    pub fn prune(&self, older_than: Duration) -> LogResult<usize> {
        let cutoff = wall_millis().saturating_sub(older_than.as_millis() as u64);

        let doomed = {
            let mut index = self.index.write();
            let doomed = prunable(&index, cutoff);
            for id in &doomed {
                index.remove(id);
            }
            doomed
        };

        if doomed.is_empty() {
            return Ok(0);
        }

        let line = encode_line(&LogEntry::Prune { cutoff })?;
        self.store.lock().append_line(&line)?;
        self.compact()?;

        tracing::debug!(removed = doomed.len(), "pruned confirmed mutations");
        Ok(doomed.len())
    }

    /// Returns true if any mutation for `record_id` has not been
    /// confirmed yet. Pulled remote changes for such records must go
    /// through conflict resolution.
    pub fn has_unconfirmed(&self, record_id: &RecordId) -> bool {
        let index = self.index.read();
        index
            .by_record
            .get(record_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| index.by_id.get(id))
                    .any(|m| !m.state.is_confirmed())
            })
            .unwrap_or(false)
    }

    /// Looks up a mutation by id.
    pub fn get(&self, id: &MutationId) -> Option<Mutation> {
        self.index.read().by_id.get(id).cloned()
    }

    /// Returns per-state counts.
    pub fn stats(&self) -> LogStats {
        let index = self.index.read();
        let mut stats = LogStats::default();
        for mutation in index.by_id.values() {
            match mutation.state {
                MutationState::Pending => stats.pending += 1,
                MutationState::InFlight => stats.in_flight += 1,
                MutationState::Confirmed => stats.confirmed += 1,
                MutationState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Rewrites the journal down to the live mutations.
    pub fn compact(&self) -> LogResult<()> {
        let index = self.index.read();
        let mut lines = Vec::with_capacity(index.order.len());
        for id in &index.order {
            if let Some(mutation) = index.by_id.get(id) {
                lines.push(encode_line(&LogEntry::Append {
                    mutation: mutation.clone(),
                })?);
            }
        }
        self.store.lock().rewrite(&lines)?;
        Ok(())
    }

    fn transition(
        &self,
        ids: &[MutationId],
        target: MutationState,
        reason: Option<&str>,
    ) -> LogResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let record_ids: Vec<RecordId> = {
            let index = self.index.read();
            ids.iter()
                .filter_map(|id| index.by_id.get(id).map(|m| m.record_id))
                .collect()
        };
        let _guards = self.locks.lock_records(&record_ids);

        let changed: Vec<MutationId> = {
            let mut index = self.index.write();
            ids.iter()
                .filter(|id| {
                    index
                        .by_id
                        .get_mut(*id)
                        .map(|m| {
                            if admissible(m.state, target) {
                                apply_transition(m, target, reason);
                                true
                            } else {
                                false
                            }
                        })
                        .unwrap_or(false)
                })
                .copied()
                .collect()
        };

        if changed.is_empty() {
            return Ok(());
        }

        let line = encode_line(&LogEntry::Mark {
            ids: changed,
            state: target,
            reason: reason.map(str::to_string),
        })?;
        self.store.lock().append_line(&line)?;
        Ok(())
    }
}

/// Valid state transitions. `Confirmed` is terminal; everything out of it
/// is a silent no-op rather than an error.
fn admissible(current: MutationState, target: MutationState) -> bool {
    use MutationState::*;
    match (current, target) {
        (Confirmed, _) => false,
        (Pending | Failed, InFlight) => true,
        (_, Confirmed) => true,
        (InFlight | Pending, Failed) => true,
        (InFlight, Pending) => true,
        _ => false,
    }
}

fn apply_transition(mutation: &mut Mutation, target: MutationState, reason: Option<&str>) {
    mutation.state = target;
    match target {
        MutationState::Failed => mutation.last_error = reason.map(str::to_string),
        MutationState::Confirmed => mutation.last_error = None,
        _ => {}
    }
}

fn prunable(index: &LogIndex, cutoff: u64) -> Vec<MutationId> {
    index
        .by_id
        .values()
        .filter(|m| m.state.is_confirmed() && m.created_at < cutoff)
        .map(|m| m.id)
        .collect()
}

fn validate(mutation: &Mutation) -> LogResult<()> {
    if mutation.record_id.is_nil() {
        return Err(LogError::InvalidMutation("nil record id".into()));
    }
    match mutation.op {
        MutationOp::Create | MutationOp::Update if mutation.payload.is_none() => Err(
            LogError::InvalidMutation(format!("{:?} without payload", mutation.op)),
        ),
        MutationOp::Delete if mutation.payload.is_some() => Err(LogError::InvalidMutation(
            "delete with payload".into(),
        )),
        _ => Ok(()),
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
