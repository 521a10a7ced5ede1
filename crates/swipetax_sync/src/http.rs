//! HTTP JSON transport for the remote store.
//!
//! The actual HTTP client is abstracted via a trait so different
//! libraries (reqwest, ureq, a loopback test client) can provide the
//! wire, and the engine crate stays free of any HTTP dependency.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swipetax_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// A plain HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this to provide the actual transport. The client owns
/// connection handling and must honor `timeout` per request; a timeout
/// is reported as an `Err` like any other transport failure.
pub trait HttpClient: Send + Sync {
    /// Sends a POST and returns the response.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<HttpResponse, String>;
}

/// Supplies the bearer credential attached to each call.
///
/// The engine never refreshes credentials; when the server rejects one,
/// the session surfaces [`SyncError::AuthExpired`] and the host
/// re-authenticates out of band.
pub trait CredentialProvider: Send + Sync {
    /// Returns the current bearer token, if any.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed credential, for CLIs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    /// Creates a provider that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// Creates a provider with no credential.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// JSON-over-HTTP remote store.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
    credentials: Arc<dyn CredentialProvider>,
    timeout: Duration,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote rooted at `base_url` (empty for same-origin).
    pub fn new(
        base_url: impl Into<String>,
        client: C,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            credentials,
            timeout,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let body = serde_json::to_vec(request)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let url = format!("{}{}", self.base_url, endpoint);
        let token = self.credentials.bearer_token();
        let response = self
            .client
            .post(&url, body, token.as_deref(), self.timeout)
            .map_err(SyncError::network_retryable)?;

        match response.status {
            200 => serde_json::from_slice(&response.body)
                .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}"))),
            401 => Err(SyncError::AuthExpired),
            status if status >= 500 => {
                Err(SyncError::network_retryable(format!("server error {status}")))
            }
            status => Err(SyncError::Protocol(format!("unexpected status {status}"))),
        }
    }
}

impl<C: HttpClient> RemoteStore for HttpRemote<C> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.post_json("/sync/push", request)
    }

    fn pull_since(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.post_json("/sync/pull", request)
    }
}
