//! In-memory attribute store
//!
//! For testing and single-device deployments.
//!
//! TigerStyle: Simple in-memory implementation with explicit capacity
//! enforcement.

use crate::store::{AttributeStore, StoreError, StoreResult};
use async_trait::async_trait;
use hearth_core::{AttributeHandle, AttributeValue, EndpointId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// One declared attribute: capacity plus last-committed value
#[derive(Debug, Clone)]
struct StoredAttribute {
    capacity: usize,
    value: AttributeValue,
}

/// In-memory attribute store
///
/// Attributes must be declared (with a capacity and seed value) before the
/// transaction manager can govern them; undeclared attributes read as not
/// found.
#[derive(Clone, Default)]
pub struct MemoryAttributeStore {
    attributes: Arc<RwLock<HashMap<(EndpointId, AttributeHandle), StoredAttribute>>>,
}

impl MemoryAttributeStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute with a capacity and seed value
    ///
    /// The seed value must be fully assigned (the store never holds
    /// unassigned handles) and fit the capacity. Re-declaring replaces the
    /// attribute.
    pub async fn declare(
        &self,
        endpoint: EndpointId,
        attribute: AttributeHandle,
        capacity: usize,
        seed: AttributeValue,
    ) -> StoreResult<()> {
        assert!(capacity > 0, "capacity must be positive");

        Self::check_value(&seed, capacity)?;

        let mut attributes = self.attributes.write().await;
        attributes.insert(
            (endpoint, attribute),
            StoredAttribute {
                capacity,
                value: seed,
            },
        );
        Ok(())
    }

    /// Structural rules enforced on every value the store accepts
    fn check_value(value: &AttributeValue, capacity: usize) -> StoreResult<()> {
        value
            .validate()
            .map_err(|e| StoreError::invalid_value(e.to_string()))?;

        if !value.is_fully_assigned() {
            return Err(StoreError::invalid_value(
                "store only accepts records with assigned handles",
            ));
        }

        if value.len() > capacity {
            return Err(StoreError::CapacityExceeded {
                count: value.len(),
                capacity,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl AttributeStore for MemoryAttributeStore {
    #[instrument(skip(self), fields(%endpoint, %attribute))]
    async fn get(
        &self,
        endpoint: EndpointId,
        attribute: AttributeHandle,
    ) -> StoreResult<AttributeValue> {
        let attributes = self.attributes.read().await;
        attributes
            .get(&(endpoint, attribute))
            .map(|a| a.value.clone())
            .ok_or(StoreError::AttributeNotFound {
                endpoint,
                attribute,
            })
    }

    #[instrument(skip(self, value), fields(%endpoint, %attribute, records = value.len()))]
    async fn set(
        &self,
        endpoint: EndpointId,
        attribute: AttributeHandle,
        value: AttributeValue,
    ) -> StoreResult<()> {
        let mut attributes = self.attributes.write().await;
        let stored = attributes
            .get_mut(&(endpoint, attribute))
            .ok_or(StoreError::AttributeNotFound {
                endpoint,
                attribute,
            })?;

        Self::check_value(&value, stored.capacity)?;

        stored.value = value;
        Ok(())
    }

    #[instrument(skip(self), fields(%endpoint, %attribute))]
    async fn capacity(
        &self,
        endpoint: EndpointId,
        attribute: AttributeHandle,
    ) -> StoreResult<usize> {
        let attributes = self.attributes.read().await;
        attributes
            .get(&(endpoint, attribute))
            .map(|a| a.capacity)
            .ok_or(StoreError::AttributeNotFound {
                endpoint,
                attribute,
            })
    }
}
