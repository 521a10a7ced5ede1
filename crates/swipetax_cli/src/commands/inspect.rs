//! Inspect command: show local sync state.

use std::error::Error;
use std::path::Path;
use swipetax_log::{FileStore, LocalRecords, MutationLog};

/// Prints mutation log and record store state.
pub fn run(dir: &Path, format: &str) -> Result<(), Box<dyn Error>> {
    let log = MutationLog::open(Box::new(FileStore::open(&super::mutations_path(dir))?))?;
    let records = LocalRecords::open(Box::new(FileStore::open(&super::records_path(dir))?))?;

    let stats = log.stats();
    let live = records.list().len();
    let tombstones = records.len() - live;
    let cursor = records.sync_cursor();

    match format {
        "json" => {
            let value = serde_json::json!({
                "mutations": {
                    "pending": stats.pending,
                    "in_flight": stats.in_flight,
                    "confirmed": stats.confirmed,
                    "failed": stats.failed,
                    "total": stats.total(),
                },
                "records": {
                    "live": live,
                    "tombstones": tombstones,
                },
                "cursor": cursor.as_str(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("Mutation log:");
            println!("  pending:   {}", stats.pending);
            println!("  in-flight: {}", stats.in_flight);
            println!("  confirmed: {}", stats.confirmed);
            println!("  failed:    {}", stats.failed);
            println!("Records:");
            println!("  live:       {live}");
            println!("  tombstones: {tombstones}");
            println!("Cursor: {cursor}");
        }
    }

    Ok(())
}
