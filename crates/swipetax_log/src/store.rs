//! Journal persistence seam.

use crate::error::LogResult;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A line-oriented durable store for journal entries.
///
/// Stores are **opaque line sinks**. They persist and return exactly the
/// lines given to them; all entry interpretation belongs to the caller.
///
/// # Invariants
///
/// - `load` returns lines in append order
/// - after `append_line` returns, the line is flushed to the medium
/// - `rewrite` atomically replaces the whole journal (used by compaction)
///
/// # Implementors
///
/// - [`MemoryStore`] - for testing
/// - [`FileStore`] - for persistent storage
pub trait LogStore: Send {
    /// Reads all journal lines in append order.
    fn load(&mut self) -> LogResult<Vec<String>>;

    /// Appends a line and flushes it.
    fn append_line(&mut self, line: &str) -> LogResult<()>;

    /// Atomically replaces the journal contents.
    fn rewrite(&mut self, lines: &[String]) -> LogResult<()>;

    /// Syncs data to durable storage (stronger than the per-append flush).
    fn sync(&mut self) -> LogResult<()>;
}

/// An in-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lines: Vec<String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with journal lines.
    pub fn with_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Returns the current line count.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if the store holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl LogStore for MemoryStore {
    fn load(&mut self) -> LogResult<Vec<String>> {
        Ok(self.lines.clone())
    }

    fn append_line(&mut self, line: &str) -> LogResult<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn rewrite(&mut self, lines: &[String]) -> LogResult<()> {
        self.lines = lines.to_vec();
        Ok(())
    }

    fn sync(&mut self) -> LogResult<()> {
        Ok(())
    }
}

/// A file-backed journal store.
///
/// One journal per file, one JSON entry per line. `rewrite` writes a
/// sibling temp file, syncs it, and renames it over the journal so a
/// crash during compaction leaves either the old or the new journal
/// intact, never a mix.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
}

impl FileStore {
    /// Opens or creates the journal at `path`, creating parent
    /// directories if needed.
    pub fn open(path: &Path) -> LogResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = Self::open_append(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the journal path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_append(path: &Path) -> LogResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path)?)
    }
}

impl LogStore for FileStore {
    fn load(&mut self) -> LogResult<Vec<String>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn append_line(&mut self, line: &str) -> LogResult<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }

    fn rewrite(&mut self, lines: &[String]) -> LogResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for line in lines {
                tmp.write_all(line.as_bytes())?;
                tmp.write_all(b"\n")?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        self.file = Self::open_append(&self.path)?;
        Ok(())
    }

    fn sync(&mut self) -> LogResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.append_line("a").unwrap();
        store.append_line("b").unwrap();
        assert_eq!(store.load().unwrap(), vec!["a", "b"]);

        store.rewrite(&["c".to_string()]).unwrap();
        assert_eq!(store.load().unwrap(), vec!["c"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");

        {
            let mut store = FileStore::open(&path).unwrap();
            store.append_line("one").unwrap();
            store.append_line("two").unwrap();
            store.sync().unwrap();
        }

        let mut store = FileStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn file_store_rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");

        let mut store = FileStore::open(&path).unwrap();
        store.append_line("old").unwrap();
        store.rewrite(&["new".to_string()]).unwrap();

        // Appends after a rewrite land after the rewritten contents.
        store.append_line("tail").unwrap();
        assert_eq!(store.load().unwrap(), vec!["new", "tail"]);
    }

    #[test]
    fn file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/journal.log");

        let mut store = FileStore::open(&path).unwrap();
        store.append_line("x").unwrap();
        assert_eq!(store.load().unwrap(), vec!["x"]);
    }
}
