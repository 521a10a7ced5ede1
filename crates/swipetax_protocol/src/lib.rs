//! # SwipeTax Sync Protocol
//!
//! Data model and wire protocol for the SwipeTax sync engine.
//!
//! This crate provides:
//! - `Record` and `Mutation` for local state and pending changes
//! - Push/pull protocol messages with cursor-based paging
//! - The last-writer-wins conflict resolver
//! - A monotonic logical clock for per-device timestamps
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod conflict;
mod messages;
mod mutation;
mod record;

pub use clock::LogicalClock;
pub use conflict::{resolve, winner, Winner};
pub use messages::{Cursor, PullRequest, PullResponse, PushRequest, PushResponse};
pub use mutation::{Mutation, MutationId, MutationOp, MutationState};
pub use record::{DeviceId, Fields, Record, RecordId};
