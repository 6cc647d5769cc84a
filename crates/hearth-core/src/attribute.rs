//! Governed attribute types
//!
//! TigerStyle: Explicit types, validation on construction, bounded
//! collections.
//!
//! A governed attribute holds an ordered sequence of structured records
//! ([`AttributeValue`]). Each record carries an identifying handle that is
//! either assigned by the store or the unassigned sentinel (`None`), and a
//! nullable built-in flag distinguishing server-provided entries from
//! client-created ones.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// =============================================================================
// EndpointId
// =============================================================================

/// Device endpoint carrying governed attributes
#[derive(
    Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Default,
)]
pub struct EndpointId(pub u16);

impl EndpointId {
    /// Create an endpoint id
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the raw endpoint number
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}", self.0)
    }
}

// =============================================================================
// AttributeHandle
// =============================================================================

/// Identifies a governed attribute within an endpoint
///
/// Assigned by the attribute schema, not by the transaction manager;
/// immutable.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AttributeHandle(pub u32);

impl AttributeHandle {
    /// Create an attribute handle
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw attribute id
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AttributeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr{:#06x}", self.0)
    }
}

// =============================================================================
// RecordHandle
// =============================================================================

/// Stable identifier of one record within a governed attribute
///
/// Assigned by the store at commit time from a per-attribute counter that is
/// monotonically increasing and never reused. Once assigned, a record's
/// handle never changes for the record's lifetime.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RecordHandle(pub u64);

impl RecordHandle {
    /// The first handle an attribute ever assigns
    pub const FIRST: RecordHandle = RecordHandle(1);

    /// Create a record handle
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw handle value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The next handle in assignment order
    pub fn next(&self) -> Self {
        debug_assert!(self.0 < u64::MAX, "record handle space exhausted");
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// OwnerId
// =============================================================================

/// Client/session identity that owns a transaction
///
/// # TigerStyle
/// - Explicit validation on construction
/// - Immutable after creation
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create a new OwnerId with validation
    ///
    /// # Errors
    /// Returns error if the id is empty, exceeds the length limit, or
    /// contains invalid characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::InvalidOwnerId {
                id,
                reason: "must not be empty".into(),
            });
        }

        if id.len() > OWNER_ID_LENGTH_BYTES_MAX {
            return Err(Error::OwnerIdTooLong {
                length: id.len(),
                limit: OWNER_ID_LENGTH_BYTES_MAX,
            });
        }

        // Alphanumeric plus separators used by session identities
        let valid = id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == ':');

        if !valid {
            return Err(Error::InvalidOwnerId {
                id,
                reason: "contains invalid characters".into(),
            });
        }

        Ok(Self(id))
    }

    /// Get the owner id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// GovernedRecord
// =============================================================================

/// One structured entry in a governed attribute's sequence
///
/// `handle: None` is the unassigned sentinel: the client is requesting the
/// store to assign a handle on commit. `built_in: None` defers to the store's
/// current flag for the matching record (new records default to not built-in).
/// The domain payload is opaque to the transaction manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernedRecord {
    /// Stable identifier, or `None` when requesting assignment on commit
    pub handle: Option<RecordHandle>,
    /// Whether this record is server-provided and immutable as a unit
    pub built_in: Option<bool>,
    /// Attribute-specific record content (schema is an external concern)
    pub payload: serde_json::Value,
}

impl GovernedRecord {
    /// Create a client-submitted record with an unassigned handle
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            handle: None,
            built_in: None,
            payload,
        }
    }

    /// Create a record with an assigned handle
    pub fn with_handle(
        handle: RecordHandle,
        built_in: Option<bool>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            handle: Some(handle),
            built_in,
            payload,
        }
    }

    /// Whether the store has assigned a handle to this record
    pub fn is_assigned(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether this record is built-in, treating null as false
    pub fn is_built_in(&self) -> bool {
        self.built_in.unwrap_or(false)
    }
}

// =============================================================================
// AttributeValue
// =============================================================================

/// Ordered sequence of governed records
///
/// Order is significant for positional comparison between a submitted value
/// and the value read back after commit, but carries no further semantics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeValue(Vec<GovernedRecord>);

impl AttributeValue {
    /// Create a value from records
    pub fn new(records: Vec<GovernedRecord>) -> Self {
        Self(records)
    }

    /// Create an empty value
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Records in submission order
    pub fn records(&self) -> &[GovernedRecord] {
        &self.0
    }

    /// Mutable access to records, preserving order
    pub fn records_mut(&mut self) -> &mut Vec<GovernedRecord> {
        &mut self.0
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the value holds no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a record by its assigned handle
    pub fn find(&self, handle: RecordHandle) -> Option<&GovernedRecord> {
        self.0.iter().find(|r| r.handle == Some(handle))
    }

    /// Whether a record with the given handle is present
    pub fn contains_handle(&self, handle: RecordHandle) -> bool {
        self.find(handle).is_some()
    }

    /// Largest assigned handle, if any record is assigned
    pub fn max_assigned_handle(&self) -> Option<RecordHandle> {
        self.0.iter().filter_map(|r| r.handle).max()
    }

    /// Whether every record carries an assigned handle
    pub fn is_fully_assigned(&self) -> bool {
        self.0.iter().all(|r| r.is_assigned())
    }

    /// Validate structural rules common to every governed attribute
    ///
    /// - bounded record count
    /// - no duplicate assigned handles
    /// - no unassigned record claiming to be built-in (clients cannot mint
    ///   built-in records)
    pub fn validate(&self) -> Result<()> {
        if self.0.len() > RECORDS_PER_ATTRIBUTE_COUNT_MAX {
            return Err(Error::TooManyRecords {
                count: self.0.len(),
                limit: RECORDS_PER_ATTRIBUTE_COUNT_MAX,
            });
        }

        let mut seen = HashSet::new();
        for record in &self.0 {
            if let Some(handle) = record.handle {
                if !seen.insert(handle) {
                    return Err(Error::invalid_value(format!(
                        "duplicate record handle {}",
                        handle
                    )));
                }
            } else if record.built_in == Some(true) {
                return Err(Error::invalid_value(
                    "unassigned record cannot be built-in",
                ));
            }
        }

        Ok(())
    }
}

impl From<Vec<GovernedRecord>> for AttributeValue {
    fn from(records: Vec<GovernedRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a AttributeValue {
    type Item = &'a GovernedRecord;
    type IntoIter = std::slice::Iter<'a, GovernedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(handle: Option<u64>, built_in: Option<bool>) -> GovernedRecord {
        GovernedRecord {
            handle: handle.map(RecordHandle::new),
            built_in,
            payload: json!({"name": "test"}),
        }
    }

    #[test]
    fn test_owner_id_valid() {
        let owner = OwnerId::new("fabric-1:node-27").unwrap();
        assert_eq!(owner.as_str(), "fabric-1:node-27");
    }

    #[test]
    fn test_owner_id_rejects_empty() {
        assert!(OwnerId::new("").is_err());
    }

    #[test]
    fn test_owner_id_rejects_invalid_chars() {
        assert!(OwnerId::new("owner with spaces").is_err());
        assert!(OwnerId::new("owner/slash").is_err());
    }

    #[test]
    fn test_owner_id_rejects_too_long() {
        let long = "x".repeat(OWNER_ID_LENGTH_BYTES_MAX + 1);
        assert!(matches!(
            OwnerId::new(long),
            Err(Error::OwnerIdTooLong { .. })
        ));
    }

    #[test]
    fn test_record_handle_next_is_monotonic() {
        let h = RecordHandle::FIRST;
        assert_eq!(h.value(), 1);
        assert_eq!(h.next().value(), 2);
        assert!(h < h.next());
    }

    #[test]
    fn test_record_built_in_null_reads_false() {
        assert!(!record(Some(1), None).is_built_in());
        assert!(record(Some(1), Some(true)).is_built_in());
    }

    #[test]
    fn test_value_validate_ok() {
        let value = AttributeValue::new(vec![
            record(Some(1), Some(true)),
            record(Some(2), Some(false)),
            record(None, None),
        ]);
        assert!(value.validate().is_ok());
    }

    #[test]
    fn test_value_rejects_duplicate_handles() {
        let value = AttributeValue::new(vec![record(Some(3), None), record(Some(3), None)]);
        assert!(value.validate().is_err());
    }

    #[test]
    fn test_value_rejects_unassigned_built_in() {
        let value = AttributeValue::new(vec![record(None, Some(true))]);
        assert!(value.validate().is_err());
    }

    #[test]
    fn test_value_rejects_too_many_records() {
        let records = (0..RECORDS_PER_ATTRIBUTE_COUNT_MAX as u64 + 1)
            .map(|i| record(Some(i + 1), None))
            .collect();
        assert!(matches!(
            AttributeValue::new(records).validate(),
            Err(Error::TooManyRecords { .. })
        ));
    }

    #[test]
    fn test_value_max_assigned_handle() {
        let value = AttributeValue::new(vec![
            record(Some(7), None),
            record(None, None),
            record(Some(2), None),
        ]);
        assert_eq!(value.max_assigned_handle(), Some(RecordHandle::new(7)));
        assert_eq!(AttributeValue::empty().max_assigned_handle(), None);
    }

    #[test]
    fn test_value_find_by_handle() {
        let value = AttributeValue::new(vec![record(Some(1), None), record(Some(2), Some(true))]);
        assert!(value.find(RecordHandle::new(2)).unwrap().is_built_in());
        assert!(value.find(RecordHandle::new(9)).is_none());
    }
}
