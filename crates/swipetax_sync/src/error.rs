//! Error types for the sync engine.

use swipetax_log::LogError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transient network or transport failure.
    #[error("network failure: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The bearer credential was rejected. The caller must
    /// re-authenticate; the engine never refreshes credentials itself.
    #[error("authentication expired")]
    AuthExpired,

    /// Malformed request or response body.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A push exceeded the per-mutation timeout.
    #[error("push timed out")]
    Timeout,

    /// Local log or record store failure.
    #[error("local log error: {0}")]
    Log(#[from] LogError),

    /// The resolver failed to produce a winner. The resolver is total,
    /// so this indicates a programming error; the session is marked
    /// failed and the condition logged.
    #[error("conflict resolution failure: {0}")]
    ConflictResolution(String),
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried in a later session.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::network_retryable("connection reset").is_retryable());
        assert!(!SyncError::network_fatal("bad certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::AuthExpired.is_retryable());
        assert!(!SyncError::Protocol("bad body".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::AuthExpired.to_string(),
            "authentication expired"
        );
        assert!(SyncError::network_retryable("dns")
            .to_string()
            .contains("dns"));
    }
}
