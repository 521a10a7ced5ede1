//! Journal entry formats and replay.

use crate::error::{LogError, LogResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use swipetax_protocol::{Cursor, Mutation, MutationId, MutationState, Record};

/// One entry in the mutation-log journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LogEntry {
    /// A mutation admitted to the log. Carries the full mutation,
    /// including its state, so compacted journals replay correctly.
    Append {
        /// The admitted mutation.
        mutation: Mutation,
    },
    /// A state transition for a set of mutations.
    Mark {
        /// Affected mutation ids.
        ids: Vec<MutationId>,
        /// State they moved to.
        state: MutationState,
        /// Failure reason, for `Failed` transitions.
        reason: Option<String>,
    },
    /// Confirmed mutations created before `cutoff` were removed.
    Prune {
        /// Unix-millis cutoff.
        cutoff: u64,
    },
}

/// One entry in the record-store journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum RecordEntry {
    /// A record version was applied (local edit or resolved sync state).
    Apply {
        /// The applied version.
        record: Record,
    },
    /// Remote pull progress advanced.
    Cursor {
        /// The new cursor.
        cursor: Cursor,
    },
}

/// Serializes an entry to its journal line.
pub fn encode_line<T: Serialize>(entry: &T) -> LogResult<String> {
    Ok(serde_json::to_string(entry)?)
}

/// Parses journal lines back into entries.
///
/// A parse failure on the final line is treated as a torn tail from an
/// interrupted write: the line is dropped with a warning. A failure
/// anywhere else means real corruption and is an error.
pub fn decode_lines<T: DeserializeOwned>(lines: &[String]) -> LogResult<Vec<T>> {
    let mut entries = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(err) if index + 1 == lines.len() => {
                tracing::warn!(line = index + 1, error = %err, "dropping torn journal tail");
            }
            Err(err) => {
                return Err(LogError::Corrupt {
                    line: index + 1,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(entries)
}
