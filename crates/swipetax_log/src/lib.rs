//! # SwipeTax Local Log
//!
//! Durable local state for the SwipeTax sync engine:
//! - `MutationLog`: append-only log of pending local changes
//! - `LocalRecords`: the device's current record store plus sync cursor
//! - `LogStore`: journal persistence seam (file-backed or in-memory)
//!
//! Both the log and the record store journal every change as a JSON line
//! and replay the journal on open, so local edits survive process
//! restarts. Mutation state transitions for one record are serialized;
//! unrelated records proceed independently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod journal;
mod log;
mod records;
mod store;

pub use error::{LogError, LogResult};
pub use log::{LogStats, MutationLog};
pub use records::LocalRecords;
pub use store::{FileStore, LogStore, MemoryStore};
