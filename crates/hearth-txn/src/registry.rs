//! Transaction registry with attribute-governance index
//!
//! TigerStyle: Single activation per (owner, endpoint) scope, O(1) busy
//! checks.
//!
//! The registry owns the `TxnKey -> WriteTransaction` map and a secondary
//! index `(endpoint, attribute) -> owner` used to answer cross-owner
//! contention checks. Invariant: the index is exactly the union of governed
//! attributes across open transactions; both structures are updated together
//! under the coordinator's lock.

use crate::error::{TxnError, TxnResult};
use crate::transaction::{TxnKey, WriteTransaction};
use hearth_core::{AttributeHandle, EndpointId, OwnerId};
use std::collections::HashMap;

/// In-memory transaction registry
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    /// Open transactions by scope key
    txns: HashMap<TxnKey, WriteTransaction>,
    /// Attribute governance index for busy checks
    governed: HashMap<(EndpointId, AttributeHandle), OwnerId>,
}

impl TransactionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open transactions
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// Whether no transactions are open
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// Owner currently governing an attribute, if any
    pub fn owner_of(&self, endpoint: EndpointId, attribute: AttributeHandle) -> Option<&OwnerId> {
        self.governed.get(&(endpoint, attribute))
    }

    /// Whether the key has an open transaction
    pub fn contains(&self, key: &TxnKey) -> bool {
        self.txns.contains_key(key)
    }

    /// Look up an open transaction
    pub fn get(&self, key: &TxnKey) -> Option<&WriteTransaction> {
        self.txns.get(key)
    }

    /// Look up an open transaction mutably
    pub fn get_mut(&mut self, key: &TxnKey) -> Option<&mut WriteTransaction> {
        self.txns.get_mut(key)
    }

    /// Register an open transaction and index its governed attributes
    ///
    /// Fails `AlreadyActive` if the key already has an open transaction and
    /// `AttributeBusy` if any governed attribute is indexed to a different
    /// owner. On failure nothing is registered.
    pub fn insert(&mut self, txn: WriteTransaction) -> TxnResult<()> {
        let key = txn.key().clone();

        if self.txns.contains_key(&key) {
            return Err(TxnError::AlreadyActive {
                owner: key.owner.to_string(),
                endpoint: key.endpoint,
            });
        }

        for attribute in txn.governed() {
            if let Some(holder) = self.governed.get(&(key.endpoint, *attribute)) {
                if *holder != key.owner {
                    return Err(TxnError::AttributeBusy {
                        endpoint: key.endpoint,
                        attribute: *attribute,
                        holder: holder.to_string(),
                    });
                }
            }
        }

        for attribute in txn.governed() {
            let prior = self
                .governed
                .insert((key.endpoint, *attribute), key.owner.clone());
            debug_assert!(prior.is_none(), "index entry must not pre-exist");
        }
        self.txns.insert(key, txn);

        self.check_invariants();
        Ok(())
    }

    /// Remove a transaction and de-index its governed attributes
    ///
    /// The single point at which governed attributes become free again;
    /// commit, rollback, expiry, and abort all funnel through here.
    pub fn remove(&mut self, key: &TxnKey) -> Option<WriteTransaction> {
        let txn = self.txns.remove(key)?;

        for attribute in txn.governed() {
            let removed = self.governed.remove(&(key.endpoint, *attribute));
            debug_assert_eq!(
                removed.as_ref(),
                Some(&key.owner),
                "index entry must match the removed transaction"
            );
        }

        self.check_invariants();
        Some(txn)
    }

    /// Keys of every open transaction held by an owner
    pub fn keys_owned_by(&self, owner: &OwnerId) -> Vec<TxnKey> {
        self.txns
            .keys()
            .filter(|k| k.owner == *owner)
            .cloned()
            .collect()
    }

    /// Assert that the governance index is exactly the union of governed
    /// attributes across open transactions
    fn check_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            let expected: usize = self.txns.values().map(|t| t.governed().len()).sum();
            debug_assert_eq!(self.governed.len(), expected);

            for ((endpoint, attribute), owner) in &self.governed {
                let key = TxnKey::new(owner.clone(), *endpoint);
                let txn = self.txns.get(&key).expect("indexed owner must be open");
                debug_assert!(txn.governs(*attribute));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::AttributeValue;
    use std::collections::HashMap as Map;

    const EP: EndpointId = EndpointId::new(1);
    const A: AttributeHandle = AttributeHandle::new(0x50);
    const B: AttributeHandle = AttributeHandle::new(0x51);

    fn owner(n: u32) -> OwnerId {
        OwnerId::new(format!("owner-{}", n)).unwrap()
    }

    fn txn(owner_n: u32, attrs: &[AttributeHandle]) -> WriteTransaction {
        let staged: Map<_, _> = attrs.iter().map(|a| (*a, AttributeValue::empty())).collect();
        WriteTransaction::new(
            TxnKey::new(owner(owner_n), EP),
            attrs.to_vec(),
            staged,
            1_000,
            5_000,
            None,
        )
    }

    #[test]
    fn test_insert_indexes_attributes() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A, B])).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.owner_of(EP, A), Some(&owner(1)));
        assert_eq!(registry.owner_of(EP, B), Some(&owner(1)));
    }

    #[test]
    fn test_second_begin_same_key_already_active() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A])).unwrap();

        let result = registry.insert(txn(1, &[B]));
        assert!(matches!(result, Err(TxnError::AlreadyActive { .. })));
        // Failed insert leaves no index residue
        assert_eq!(registry.owner_of(EP, B), None);
    }

    #[test]
    fn test_overlapping_attribute_busy() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A])).unwrap();

        let result = registry.insert(txn(2, &[A, B]));
        assert!(matches!(result, Err(TxnError::AttributeBusy { .. })));
        assert_eq!(registry.owner_of(EP, B), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disjoint_owners_coexist() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A])).unwrap();
        registry.insert(txn(2, &[B])).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.owner_of(EP, A), Some(&owner(1)));
        assert_eq!(registry.owner_of(EP, B), Some(&owner(2)));
    }

    #[test]
    fn test_remove_frees_attributes() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A, B])).unwrap();

        let key = TxnKey::new(owner(1), EP);
        assert!(registry.remove(&key).is_some());
        assert!(registry.is_empty());
        assert_eq!(registry.owner_of(EP, A), None);

        // Second remove is a no-op
        assert!(registry.remove(&key).is_none());

        // Freed attributes can be claimed by another owner
        registry.insert(txn(2, &[A])).unwrap();
        assert_eq!(registry.owner_of(EP, A), Some(&owner(2)));
    }

    #[test]
    fn test_keys_owned_by() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1, &[A])).unwrap();
        registry.insert(txn(2, &[B])).unwrap();

        let keys = registry.keys_owned_by(&owner(1));
        assert_eq!(keys, vec![TxnKey::new(owner(1), EP)]);
        assert!(registry.keys_owned_by(&owner(3)).is_empty());
    }
}
