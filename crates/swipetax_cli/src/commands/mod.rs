//! CLI subcommand implementations.

pub mod endpoint;
pub mod inspect;
pub mod prune;
pub mod sync;

use std::path::{Path, PathBuf};

/// Journal file for the mutation log.
pub fn mutations_path(dir: &Path) -> PathBuf {
    dir.join("mutations.log")
}

/// Journal file for the record store.
pub fn records_path(dir: &Path) -> PathBuf {
    dir.join("records.log")
}
