//! AttributeStore trait and errors
//!
//! TigerStyle: Explicit operations, atomic per call.

use async_trait::async_trait;
use hearth_core::{AttributeHandle, AttributeValue, EndpointId};
use thiserror::Error;

/// Store-specific errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Attribute is not declared at the endpoint
    #[error("attribute {attribute} not found at endpoint {endpoint}")]
    AttributeNotFound {
        endpoint: EndpointId,
        attribute: AttributeHandle,
    },

    /// Value violates structural rules the store enforces
    #[error("invalid attribute value: {reason}")]
    InvalidValue { reason: String },

    /// Value exceeds the attribute's declared capacity
    #[error("record count {count} exceeds capacity {capacity}")]
    CapacityExceeded { count: usize, capacity: usize },

    /// Internal store error
    #[error("internal store error: {reason}")]
    Internal { reason: String },
}

impl StoreError {
    /// Create an attribute not found error
    pub fn attribute_not_found(endpoint: EndpointId, attribute: AttributeHandle) -> Self {
        Self::AttributeNotFound {
            endpoint,
            attribute,
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Last-committed value store for governed attributes
///
/// # Guarantees
/// - `set` is atomic per call: readers observe either the previous value or
///   the new value, never a partial write.
/// - `set` rejects structurally invalid values (unassigned handles,
///   duplicate handles, capacity overflow); the transaction manager surfaces
///   such rejections as commit-time failures.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Get the last-committed value of an attribute
    async fn get(&self, endpoint: EndpointId, attribute: AttributeHandle)
        -> StoreResult<AttributeValue>;

    /// Replace the committed value of an attribute
    async fn set(
        &self,
        endpoint: EndpointId,
        attribute: AttributeHandle,
        value: AttributeValue,
    ) -> StoreResult<()>;

    /// Maximum number of records the attribute can hold
    async fn capacity(&self, endpoint: EndpointId, attribute: AttributeHandle)
        -> StoreResult<usize>;

    /// Whether the attribute is declared at the endpoint
    async fn contains(&self, endpoint: EndpointId, attribute: AttributeHandle) -> bool {
        self.get(endpoint, attribute).await.is_ok()
    }
}
