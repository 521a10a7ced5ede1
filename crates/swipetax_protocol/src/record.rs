//! Records: the synced data items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Attribute map of a record (expense fields: amount, category, note, ...).
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Stable identifier of a record.
///
/// Assigned once by the creating client and never changed. New ids use
/// UUIDv7 so they sort roughly by creation time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generates a fresh time-ordered record id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the nil id (all zeros). Never valid for a real record.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true if this is the nil id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the device that produced a mutation.
///
/// Conflict ties are broken by comparing device ids; `Ord` on the
/// underlying UUID bytes matches lexicographic order of the canonical
/// hyphenated form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generates a fresh device id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A categorized expense entry subject to sync.
///
/// # Invariants
///
/// - `id` is immutable once created
/// - `updated_at` only increases for a given `id` on a given device
/// - a deleted record is a tombstone: it keeps its identity so stale
///   remote copies cannot resurrect it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable record identifier.
    pub id: RecordId,
    /// Attribute values.
    pub fields: Fields,
    /// Logical timestamp of the last mutation, monotonic per device.
    pub updated_at: u64,
    /// Device that produced the last mutation.
    pub device_id: DeviceId,
    /// Tombstone flag.
    pub deleted: bool,
}

impl Record {
    /// Creates a live record.
    pub fn new(id: RecordId, fields: Fields, updated_at: u64, device_id: DeviceId) -> Self {
        Self {
            id,
            fields,
            updated_at,
            device_id,
            deleted: false,
        }
    }

    /// Creates a tombstone for a deleted record.
    pub fn tombstone(id: RecordId, updated_at: u64, device_id: DeviceId) -> Self {
        Self {
            id,
            fields: Fields::new(),
            updated_at,
            device_id,
            deleted: true,
        }
    }
}
