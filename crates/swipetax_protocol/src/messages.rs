//! Wire messages for the push/pull sync protocol.

use crate::mutation::Mutation;
use crate::record::{DeviceId, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque marker of remote sync progress.
///
/// The client stores the cursor returned by each pull and hands it back
/// on the next one; it never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// The cursor for a client that has never pulled.
    pub fn start() -> Self {
        Self(String::new())
    }

    /// Wraps a server-issued cursor value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw cursor value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no progress has been recorded yet.
    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_start() {
            f.write_str("<start>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Push of a single local mutation to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// The mutation to apply remotely.
    pub mutation: Mutation,
    /// The pushing device.
    pub device_id: DeviceId,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(mutation: Mutation, device_id: DeviceId) -> Self {
        Self {
            mutation,
            device_id,
        }
    }
}

/// Server response to a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the server applied the mutation.
    pub accepted: bool,
    /// The server's record after handling the push. Always present when
    /// `accepted` is false (the authoritative state that superseded the
    /// mutation); optionally present on acceptance.
    pub server_record: Option<Record>,
}

impl PushResponse {
    /// An acceptance without a record echo.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            server_record: None,
        }
    }

    /// An acceptance echoing the server's resulting record.
    pub fn accepted_with(record: Record) -> Self {
        Self {
            accepted: true,
            server_record: Some(record),
        }
    }

    /// A rejection carrying the authoritative record.
    pub fn superseded(record: Record) -> Self {
        Self {
            accepted: false,
            server_record: Some(record),
        }
    }
}

/// Request for remote changes since a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Last cursor the client has seen.
    pub cursor: Cursor,
    /// Maximum records per page.
    pub limit: u32,
}

impl PullRequest {
    /// Creates a pull request.
    pub fn new(cursor: Cursor, limit: u32) -> Self {
        Self { cursor, limit }
    }
}

/// One page of remote changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Changed records, in server commit order.
    pub records: Vec<Record>,
    /// Cursor to resume from.
    pub next_cursor: Cursor,
    /// Whether more pages are available.
    pub has_more: bool,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(records: Vec<Record>, next_cursor: Cursor, has_more: bool) -> Self {
        Self {
            records,
            next_cursor,
            has_more,
        }
    }

    /// A page with no changes.
    pub fn empty(cursor: Cursor) -> Self {
        Self {
            records: Vec::new(),
            next_cursor: cursor,
            has_more: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Fields, RecordId};

    #[test]
    fn cursor_start_is_empty() {
        assert!(Cursor::start().is_start());
        assert!(Cursor::default().is_start());
        assert!(!Cursor::new("feed:42").is_start());
        assert_eq!(Cursor::new("feed:42").as_str(), "feed:42");
    }

    #[test]
    fn push_response_constructors() {
        let record = Record::new(RecordId::generate(), Fields::new(), 1, DeviceId::generate());

        assert!(PushResponse::accepted().accepted);
        assert!(PushResponse::accepted_with(record.clone()).server_record.is_some());

        let superseded = PushResponse::superseded(record);
        assert!(!superseded.accepted);
        assert!(superseded.server_record.is_some());
    }

    #[test]
    fn pull_response_json_roundtrip() {
        let record = Record::new(RecordId::generate(), Fields::new(), 5, DeviceId::generate());
        let response = PullResponse::new(vec![record], Cursor::new("c9"), true);

        let json = serde_json::to_string(&response).unwrap();
        let decoded: PullResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn empty_page_keeps_cursor() {
        let page = PullResponse::empty(Cursor::new("c3"));
        assert!(page.records.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.next_cursor, Cursor::new("c3"));
    }
}
