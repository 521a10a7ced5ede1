//! Mutations: pending local changes awaiting remote confirmation.

use crate::record::{Fields, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a mutation in the local log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct MutationId(Uuid);

impl MutationId {
    /// Generates a fresh mutation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The intended change a mutation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOp {
    /// A new record.
    Create,
    /// A change to an existing record's fields.
    Update,
    /// A deletion (becomes a tombstone).
    Delete,
}

/// Lifecycle state of a mutation.
///
/// Transitions: `Pending → InFlight → {Confirmed, Failed}`; `Failed`
/// returns to the push queue on the next session. `Confirmed` is
/// terminal: any further transition is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    /// Captured locally, not yet picked up by a sync session.
    Pending,
    /// Picked up by the current sync session.
    InFlight,
    /// Acknowledged by the server. Terminal.
    Confirmed,
    /// The last push attempt failed; eligible for retry.
    Failed,
}

impl MutationState {
    /// Returns true if the mutation has been settled by the server.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationState::Confirmed)
    }

    /// Returns true if a sync session should push this mutation.
    pub fn needs_push(&self) -> bool {
        matches!(self, MutationState::Pending | MutationState::Failed)
    }
}

/// A pending local change to a record.
///
/// Created on local edit, confirmed (or failed) by the sync engine,
/// garbage-collected once confirmed and older than the retention window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Unique mutation id.
    pub id: MutationId,
    /// The record this mutation changes.
    pub record_id: RecordId,
    /// The kind of change.
    pub op: MutationOp,
    /// New field values (`Create`/`Update`); `None` for `Delete`.
    pub payload: Option<Fields>,
    /// Capture timestamp (unix millis), assigned by the log on append.
    pub created_at: u64,
    /// Lifecycle state.
    pub state: MutationState,
    /// Reason for the most recent failure, if any.
    pub last_error: Option<String>,
}

impl Mutation {
    /// Creates a `Create` mutation. `created_at` is assigned on append.
    pub fn create(record_id: RecordId, payload: Fields) -> Self {
        Self::new(record_id, MutationOp::Create, Some(payload))
    }

    /// Creates an `Update` mutation.
    pub fn update(record_id: RecordId, payload: Fields) -> Self {
        Self::new(record_id, MutationOp::Update, Some(payload))
    }

    /// Creates a `Delete` mutation.
    pub fn delete(record_id: RecordId) -> Self {
        Self::new(record_id, MutationOp::Delete, None)
    }

    fn new(record_id: RecordId, op: MutationOp, payload: Option<Fields>) -> Self {
        Self {
            id: MutationId::generate(),
            record_id,
            op,
            payload,
            created_at: 0,
            state: MutationState::Pending,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Fields {
        let mut f = Fields::new();
        f.insert("amount".into(), serde_json::json!(10));
        f
    }

    #[test]
    fn constructors_set_payload_shape() {
        let id = RecordId::generate();

        let create = Mutation::create(id, fields());
        assert_eq!(create.op, MutationOp::Create);
        assert!(create.payload.is_some());
        assert_eq!(create.state, MutationState::Pending);

        let delete = Mutation::delete(id);
        assert_eq!(delete.op, MutationOp::Delete);
        assert!(delete.payload.is_none());
    }

    #[test]
    fn state_predicates() {
        assert!(MutationState::Pending.needs_push());
        assert!(MutationState::Failed.needs_push());
        assert!(!MutationState::InFlight.needs_push());
        assert!(!MutationState::Confirmed.needs_push());
        assert!(MutationState::Confirmed.is_confirmed());
    }

    #[test]
    fn mutation_json_roundtrip() {
        let mutation = Mutation::update(RecordId::generate(), fields());
        let json = serde_json::to_string(&mutation).unwrap();
        let decoded: Mutation = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, mutation);
    }
}
