//! Error types for the local log.

use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in the mutation log and record store.
#[derive(Error, Debug)]
pub enum LogError {
    /// A malformed local write, rejected before entering the journal.
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),

    /// Underlying I/O failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Journal entry serialization failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The journal is damaged beyond the tolerated torn tail.
    #[error("corrupt journal at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number of the damaged entry.
        line: usize,
        /// Parse failure description.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LogError::InvalidMutation("missing payload".into());
        assert_eq!(err.to_string(), "invalid mutation: missing payload");

        let err = LogError::Corrupt {
            line: 3,
            reason: "bad json".into(),
        };
        assert!(err.to_string().contains("line 3"));
    }
}
