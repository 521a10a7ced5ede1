//! The device's local record store.

use crate::error::LogResult;
use crate::journal::{decode_lines, encode_line, RecordEntry};
use crate::store::LogStore;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use swipetax_protocol::{Cursor, Record, RecordId};

#[derive(Default)]
struct RecordsIndex {
    records: BTreeMap<RecordId, Record>,
    cursor: Cursor,
}

/// The current record state on this device, plus the remote pull cursor.
///
/// Reads and writes always succeed against local state regardless of
/// sync progress. The UI reads through `get`/`list`; resolved sync state
/// arrives through `apply`. Tombstones are kept (and hidden from `list`)
/// so stale remote copies cannot resurrect deleted records.
pub struct LocalRecords {
    index: RwLock<RecordsIndex>,
    store: Mutex<Box<dyn LogStore>>,
}

impl LocalRecords {
    /// Opens the store, replaying its journal.
    pub fn open(mut store: Box<dyn LogStore>) -> LogResult<Self> {
        let lines = store.load()?;
        let entries: Vec<RecordEntry> = decode_lines(&lines)?;

        let mut index = RecordsIndex::default();
        for entry in entries {
            match entry {
                RecordEntry::Apply { record } => {
                    index.records.insert(record.id, record);
                }
                RecordEntry::Cursor { cursor } => index.cursor = cursor,
            }
        }

        let live = index.records.len();
        let records = Self {
            index: RwLock::new(index),
            store: Mutex::new(store),
        };

        if lines.len() > live * 2 + 16 {
            records.compact()?;
        }

        Ok(records)
    }

    /// Returns a record (tombstones included) by id.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.index.read().records.get(id).cloned()
    }

    /// Returns all live (non-tombstone) records.
    pub fn list(&self) -> Vec<Record> {
        self.index
            .read()
            .records
            .values()
            .filter(|r| !r.deleted)
            .cloned()
            .collect()
    }

    /// Upserts a record version and journals it.
    pub fn apply(&self, record: Record) -> LogResult<()> {
        let line = encode_line(&RecordEntry::Apply {
            record: record.clone(),
        })?;
        // Store lock held across both updates so the journal replays in
        // the same order the index was written.
        let mut store = self.store.lock();
        self.index.write().records.insert(record.id, record);
        store.append_line(&line)?;
        Ok(())
    }

    /// Returns the persisted remote sync cursor.
    pub fn sync_cursor(&self) -> Cursor {
        self.index.read().cursor.clone()
    }

    /// Persists a new remote sync cursor.
    pub fn set_sync_cursor(&self, cursor: Cursor) -> LogResult<()> {
        let line = encode_line(&RecordEntry::Cursor {
            cursor: cursor.clone(),
        })?;
        let mut store = self.store.lock();
        self.index.write().cursor = cursor;
        store.append_line(&line)?;
        Ok(())
    }

    /// Number of records held, tombstones included.
    pub fn len(&self) -> usize {
        self.index.read().records.len()
    }

    /// Returns true if no records are held.
    pub fn is_empty(&self) -> bool {
        self.index.read().records.is_empty()
    }

    /// Rewrites the journal down to current state.
    pub fn compact(&self) -> LogResult<()> {
        let index = self.index.read();
        let mut lines = Vec::with_capacity(index.records.len() + 1);
        for record in index.records.values() {
            lines.push(encode_line(&RecordEntry::Apply {
                record: record.clone(),
            })?);
        }
        if !index.cursor.is_start() {
            lines.push(encode_line(&RecordEntry::Cursor {
                cursor: index.cursor.clone(),
            })?);
        }
        self.store.lock().rewrite(&lines)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};
    use swipetax_protocol::{DeviceId, Fields};

    fn record(updated_at: u64) -> Record {
        let mut fields = Fields::new();
        fields.insert("category".into(), serde_json::json!("meals"));
        Record::new(RecordId::generate(), fields, updated_at, DeviceId::generate())
    }

    fn open_memory() -> LocalRecords {
        LocalRecords::open(Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn apply_and_get() {
        let records = open_memory();
        let r = record(1);

        records.apply(r.clone()).unwrap();
        assert_eq!(records.get(&r.id), Some(r.clone()));
        assert_eq!(records.list(), vec![r]);
    }

    #[test]
    fn tombstones_are_kept_but_hidden() {
        let records = open_memory();
        let r = record(1);
        records.apply(r.clone()).unwrap();

        let tomb = Record::tombstone(r.id, 2, r.device_id);
        records.apply(tomb.clone()).unwrap();

        assert!(records.list().is_empty());
        assert_eq!(records.get(&r.id), Some(tomb));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn cursor_roundtrip() {
        let records = open_memory();
        assert!(records.sync_cursor().is_start());

        records.set_sync_cursor(Cursor::new("feed:17")).unwrap();
        assert_eq!(records.sync_cursor(), Cursor::new("feed:17"));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let r = record(3);

        {
            let records = LocalRecords::open(Box::new(FileStore::open(&path).unwrap())).unwrap();
            records.apply(r.clone()).unwrap();
            records.set_sync_cursor(Cursor::new("feed:9")).unwrap();
        }

        let records = LocalRecords::open(Box::new(FileStore::open(&path).unwrap())).unwrap();
        assert_eq!(records.get(&r.id), Some(r));
        assert_eq!(records.sync_cursor(), Cursor::new("feed:9"));
    }

    #[test]
    fn compaction_keeps_latest_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let r = record(1);

        {
            let records = LocalRecords::open(Box::new(FileStore::open(&path).unwrap())).unwrap();
            for updated_at in 1..=20 {
                let mut version = r.clone();
                version.updated_at = updated_at;
                records.apply(version).unwrap();
            }
            records.compact().unwrap();
        }

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);

        let records = LocalRecords::open(Box::new(store)).unwrap();
        assert_eq!(records.get(&r.id).unwrap().updated_at, 20);
    }
}
