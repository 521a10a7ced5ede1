//! # SwipeTax Sync Engine
//!
//! Offline-first synchronization between the device's local store and
//! the remote authoritative store.
//!
//! This crate provides:
//! - Sync state machine (idle → syncing → synced/error/offline)
//! - Session coalescing (at most one sync session at a time)
//! - Conflict resolution against pending local mutations
//! - Capped exponential backoff between automatic retries
//! - Endpoint resolution for web vs. packaged-app runtimes
//! - Transport abstraction with an HTTP JSON implementation
//! - A status publisher decoupled from any UI framework
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** synchronization model:
//! 1. Push pending local mutations in capture order
//! 2. Pull remote changes since the last cursor
//! 3. Resolve conflicts with unconfirmed local state, last writer wins
//!
//! ## Key Invariants
//!
//! - Local reads and writes never block on sync
//! - At most one sync session runs; concurrent triggers coalesce
//! - Each mutation gets one push attempt per session
//! - Tombstones stay sticky against stale remote copies

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod endpoint;
mod engine;
mod error;
mod http;
mod status;
mod transport;

pub use config::{Backoff, BackoffConfig, SyncConfig};
pub use driver::SyncDriver;
pub use endpoint::{resolve_base_url, Environment};
pub use engine::{SessionOutcome, SessionReport, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use http::{CredentialProvider, HttpClient, HttpRemote, HttpResponse, StaticCredential};
pub use status::{StatusPublisher, SyncState, SyncStatus};
pub use transport::{MockRemote, RemoteStore};
