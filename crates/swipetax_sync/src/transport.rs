//! Remote store abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use swipetax_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// The remote authoritative store, as seen by the sync engine.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP JSON, an in-process store for tests, etc.).
pub trait RemoteStore: Send + Sync {
    /// Pushes one local mutation.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Pulls remote changes since a cursor.
    fn pull_since(&self, request: &PullRequest) -> SyncResult<PullResponse>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<T> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        (**self).push(request)
    }

    fn pull_since(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        (**self).pull_since(request)
    }
}

/// A scripted remote for engine tests.
///
/// Responses are consumed from queues; when a queue is empty, pushes are
/// accepted without an echo and pulls return an empty page. Call counts
/// are tracked so tests can assert how much network traffic a session
/// produced.
#[derive(Default)]
pub struct MockRemote {
    push_queue: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_queue: Mutex<VecDeque<SyncResult<PullResponse>>>,
    push_calls: AtomicUsize,
    pull_calls: AtomicUsize,
}

impl MockRemote {
    /// Creates a mock that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response for an upcoming push.
    pub fn enqueue_push(&self, response: SyncResult<PushResponse>) {
        self.push_queue.lock().push_back(response);
    }

    /// Queues the response for an upcoming pull.
    pub fn enqueue_pull(&self, response: SyncResult<PullResponse>) {
        self.pull_queue.lock().push_back(response);
    }

    /// Number of pushes received.
    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Number of pulls received.
    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Total network calls received.
    pub fn total_calls(&self) -> usize {
        self.push_calls() + self.pull_calls()
    }
}

impl RemoteStore for MockRemote {
    fn push(&self, _request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.push_queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PushResponse::accepted()))
    }

    fn pull_since(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.pull_queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(PullResponse::empty(request.cursor.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swipetax_protocol::{Cursor, DeviceId, Mutation, RecordId};

    fn push_request() -> PushRequest {
        PushRequest::new(Mutation::delete(RecordId::generate()), DeviceId::generate())
    }

    #[test]
    fn defaults_accept_and_return_empty_pages() {
        let remote = MockRemote::new();

        let push = remote.push(&push_request()).unwrap();
        assert!(push.accepted);

        let pull = remote
            .pull_since(&PullRequest::new(Cursor::new("c1"), 10))
            .unwrap();
        assert!(pull.records.is_empty());
        assert_eq!(pull.next_cursor, Cursor::new("c1"));
    }

    #[test]
    fn queued_responses_are_consumed_in_order() {
        let remote = MockRemote::new();
        remote.enqueue_push(Err(SyncError::Timeout));
        remote.enqueue_push(Ok(PushResponse::accepted()));

        assert!(remote.push(&push_request()).is_err());
        assert!(remote.push(&push_request()).is_ok());
        assert_eq!(remote.push_calls(), 2);
    }

    #[test]
    fn call_counters() {
        let remote = MockRemote::new();
        let _ = remote.push(&push_request());
        let _ = remote.pull_since(&PullRequest::new(Cursor::start(), 10));
        let _ = remote.pull_since(&PullRequest::new(Cursor::start(), 10));

        assert_eq!(remote.push_calls(), 1);
        assert_eq!(remote.pull_calls(), 2);
        assert_eq!(remote.total_calls(), 3);
    }
}
