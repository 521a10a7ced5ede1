//! Prune command: garbage-collect confirmed mutations.

use std::error::Error;
use std::path::Path;
use std::time::Duration;
use swipetax_log::{FileStore, MutationLog};

/// Removes confirmed mutations older than `max_age_secs` and compacts
/// the journal.
pub fn run(dir: &Path, max_age_secs: u64) -> Result<(), Box<dyn Error>> {
    let log = MutationLog::open(Box::new(FileStore::open(&super::mutations_path(dir))?))?;

    let removed = log.prune(Duration::from_secs(max_age_secs))?;
    let remaining = log.stats();

    println!("Removed {removed} confirmed mutation(s)");
    println!("{} mutation(s) remain", remaining.total());

    Ok(())
}
