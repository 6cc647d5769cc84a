//! Atomic write coordinator
//!
//! TigerStyle: One lock, explicit terminal transitions, no hidden
//! singletons.
//!
//! The coordinator is the public entry point for the transaction protocol.
//! It owns the registry, the sweeper schedule, and the per-attribute handle
//! counters behind a single `RwLock`; removing a transaction from the
//! registry under that lock is the terminal transition, so exactly one of
//! {commit, rollback, expire, abort} wins any race and the losers observe
//! `NotFound`.

use crate::error::{TxnError, TxnResult};
use crate::registry::TransactionRegistry;
use crate::sweeper::TimeoutSweeper;
use crate::transaction::{AttrOutcome, TxnKey, TxnState, WriteTransaction};
use hearth_core::{
    AttributeHandle, AttributeValue, EndpointId, HearthConfig, OwnerId, RecordHandle, StatusCode,
    SweeperConfig, TimeProvider, TxnConfig, WallClockTime, TXN_ATTRS_COUNT_MAX,
};
use hearth_store::{AttributeStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Outcomes
// =============================================================================

/// Status of one attribute within a begin or commit response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStatus {
    /// The governed attribute
    pub attribute: AttributeHandle,
    /// Its individual status
    pub status: StatusCode,
}

/// Response to a begin request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginOutcome {
    /// Overall status; `Failure` means no transaction was created
    pub overall: StatusCode,
    /// Per-attribute snapshot statuses, in request order
    pub per_attribute: Vec<AttributeStatus>,
    /// Server-clamped timeout actually applied (milliseconds)
    pub effective_timeout_ms: u64,
}

/// Response to a commit request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Overall status; `Failure` means nothing was flushed and the
    /// transaction was destroyed
    pub overall: StatusCode,
    /// Per-attribute validation statuses, in governed order
    pub per_attribute: Vec<AttributeStatus>,
    /// The transaction's original effective timeout, reported for audit
    /// (the transaction no longer exists once this response is produced)
    pub effective_timeout_ms: u64,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Mutable coordinator state, guarded by one lock
struct Inner {
    registry: TransactionRegistry,
    sweeper: TimeoutSweeper,
    /// Next record handle per attribute; monotonic, never reused
    next_handles: HashMap<(EndpointId, AttributeHandle), RecordHandle>,
}

/// Public entry point for the atomic attribute-transaction protocol
pub struct AtomicWriteCoordinator {
    store: Arc<dyn AttributeStore>,
    time: Arc<dyn TimeProvider>,
    txn_config: TxnConfig,
    sweeper_config: SweeperConfig,
    inner: RwLock<Inner>,
}

impl AtomicWriteCoordinator {
    /// Create a coordinator with the production wall clock
    pub fn new(store: Arc<dyn AttributeStore>, config: HearthConfig) -> Self {
        Self::with_providers(store, config, Arc::new(WallClockTime::new()))
    }

    /// Create with a custom time provider (for deterministic tests)
    pub fn with_providers(
        store: Arc<dyn AttributeStore>,
        config: HearthConfig,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        // TigerStyle: reject a bad config at construction, not first use
        assert!(config.validate().is_ok(), "invalid configuration");

        Self {
            store,
            time,
            txn_config: config.txn,
            sweeper_config: config.sweeper,
            inner: RwLock::new(Inner {
                registry: TransactionRegistry::new(),
                sweeper: TimeoutSweeper::new(),
                next_handles: HashMap::new(),
            }),
        }
    }

    /// Open a transaction governing a set of attributes
    ///
    /// The requested timeout is silently clamped into the configured range.
    /// If any requested attribute is unknown the begin fails as a whole:
    /// per-attribute statuses report which, and no transaction is created.
    #[instrument(skip(self, attributes), fields(%owner, %endpoint, attrs = attributes.len()))]
    pub async fn begin(
        &self,
        owner: &OwnerId,
        endpoint: EndpointId,
        attributes: &[AttributeHandle],
        timeout_ms: u64,
    ) -> TxnResult<BeginOutcome> {
        if attributes.is_empty() {
            return Err(TxnError::EmptyAttributeSet);
        }
        if attributes.len() > TXN_ATTRS_COUNT_MAX {
            return Err(TxnError::TooManyAttributes {
                count: attributes.len(),
                limit: TXN_ATTRS_COUNT_MAX,
            });
        }

        // Dedup while preserving request order
        let mut requested: Vec<AttributeHandle> = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            if !requested.contains(attribute) {
                requested.push(*attribute);
            }
        }

        let effective_timeout_ms = self.txn_config.clamp_timeout(timeout_ms);
        let key = TxnKey::new(owner.clone(), endpoint);

        let mut inner = self.inner.write().await;
        let now_ms = self.time.now_ms();

        // Reclaim anything already due so a stale transaction cannot block
        // this begin
        self.expire_due_locked(&mut inner, now_ms);

        if inner.registry.contains(&key) {
            return Err(TxnError::AlreadyActive {
                owner: owner.to_string(),
                endpoint,
            });
        }

        for attribute in &requested {
            if let Some(holder) = inner.registry.owner_of(endpoint, *attribute) {
                // The same owner holding it would mean `contains` lied
                debug_assert_ne!(holder, owner);
                return Err(TxnError::AttributeBusy {
                    endpoint,
                    attribute: *attribute,
                    holder: holder.to_string(),
                });
            }
        }

        // Snapshot the current committed value of each attribute
        let mut staged = HashMap::with_capacity(requested.len());
        let mut per_attribute = Vec::with_capacity(requested.len());
        let mut unknown = 0usize;
        for attribute in &requested {
            match self.store.get(endpoint, *attribute).await {
                Ok(value) => {
                    staged.insert(*attribute, value);
                    per_attribute.push(AttributeStatus {
                        attribute: *attribute,
                        status: StatusCode::Success,
                    });
                }
                Err(StoreError::AttributeNotFound { .. }) => {
                    unknown += 1;
                    per_attribute.push(AttributeStatus {
                        attribute: *attribute,
                        status: StatusCode::Failure,
                    });
                }
                Err(e) => return Err(TxnError::Store(e)),
            }
        }

        if unknown > 0 {
            warn!(%key, unknown, "begin rejected: unknown attributes");
            return Ok(BeginOutcome {
                overall: StatusCode::Failure,
                per_attribute,
                effective_timeout_ms,
            });
        }

        let txn = WriteTransaction::new(
            key.clone(),
            requested,
            staged,
            now_ms,
            effective_timeout_ms,
            self.txn_config.idle_timeout_ms,
        );
        let expires_at_ms = txn.expires_at_ms();
        inner.registry.insert(txn)?;
        inner.sweeper.schedule(expires_at_ms, key.clone());

        debug!(%key, effective_timeout_ms, "transaction opened");
        Ok(BeginOutcome {
            overall: StatusCode::Success,
            per_attribute,
            effective_timeout_ms,
        })
    }

    /// Stage a value for a governed attribute
    ///
    /// Default-deny: without an open transaction governing the attribute the
    /// write is rejected `InvalidInState`, independent of value validity.
    /// A valid write mutates the staged copy only.
    #[instrument(skip(self, value), fields(%owner, %endpoint, %attribute))]
    pub async fn write(
        &self,
        owner: &OwnerId,
        endpoint: EndpointId,
        attribute: AttributeHandle,
        value: AttributeValue,
    ) -> TxnResult<()> {
        let key = TxnKey::new(owner.clone(), endpoint);
        let mut inner = self.inner.write().await;
        let now_ms = self.time.now_ms();

        // A transaction past its deadline no longer accepts writes, even if
        // the sweeper has not fired yet
        if inner
            .registry
            .get(&key)
            .is_some_and(|t| t.is_expired(now_ms))
        {
            self.expire_locked(&mut inner, &key);
        }

        let Some(txn) = inner.registry.get_mut(&key) else {
            return Err(TxnError::WriteOutsideTransaction {
                endpoint,
                attribute,
            });
        };

        if !txn.governs(attribute) {
            return Err(TxnError::NotGoverned {
                endpoint,
                attribute,
            });
        }

        value
            .validate()
            .map_err(|e| TxnError::invalid_value(e.to_string()))?;

        txn.stage(attribute, value, now_ms);
        Ok(())
    }

    /// Commit the transaction, flushing staged values to the store
    ///
    /// All-or-nothing: the validation pass runs over every governed
    /// attribute before the first store write, so a failure on any attribute
    /// leaves the store untouched. Either way the transaction is destroyed.
    #[instrument(skip(self), fields(%owner, %endpoint))]
    pub async fn commit(
        &self,
        owner: &OwnerId,
        endpoint: EndpointId,
    ) -> TxnResult<CommitOutcome> {
        let key = TxnKey::new(owner.clone(), endpoint);
        let mut inner = self.inner.write().await;
        let now_ms = self.time.now_ms();

        if inner
            .registry
            .get(&key)
            .is_some_and(|t| t.is_expired(now_ms))
        {
            self.expire_locked(&mut inner, &key);
        }

        // Terminal decision point: removal under the lock is what a racing
        // expire or rollback would also perform, so exactly one wins
        let Some(mut txn) = inner.registry.remove(&key) else {
            return Err(TxnError::NoOpenTransaction {
                owner: owner.to_string(),
                endpoint,
            });
        };
        inner.sweeper.cancel(&key);
        txn.transition(TxnState::Committing);

        let effective_timeout_ms = txn.effective_timeout_ms();

        // Validation pass: every attribute is checked before anything is
        // flushed
        let mut planned: Vec<(AttributeHandle, AttributeValue)> = Vec::new();
        let mut failures = 0usize;
        for attribute in txn.governed().to_vec() {
            let staged = txn
                .staged_value(attribute)
                .cloned()
                .ok_or_else(|| TxnError::Internal {
                    reason: format!("no staged value for governed attribute {}", attribute),
                })?;

            match self
                .prepare_commit_value(&mut inner.next_handles, endpoint, attribute, staged)
                .await
            {
                Ok(prepared) => {
                    txn.mark(attribute, AttrOutcome::Succeeded);
                    planned.push((attribute, prepared));
                }
                Err(reason) => {
                    warn!(%key, %attribute, %reason, "commit validation failed");
                    txn.mark(attribute, AttrOutcome::Failed);
                    failures += 1;
                }
            }
        }

        let per_attribute = txn
            .outcome_statuses()
            .into_iter()
            .map(|(attribute, status)| AttributeStatus { attribute, status })
            .collect();

        if failures > 0 {
            txn.transition(TxnState::RolledBack);
            info!(%key, failures, "commit rejected; transaction destroyed");
            return Ok(CommitOutcome {
                overall: StatusCode::Failure,
                per_attribute,
                effective_timeout_ms,
            });
        }

        // Flush. Values were validated above, so store rejections here are
        // internal errors rather than client failures.
        for (attribute, value) in planned {
            self.store
                .set(endpoint, attribute, value)
                .await
                .map_err(|e| TxnError::Internal {
                    reason: format!("commit flush for {} rejected: {}", attribute, e),
                })?;
        }
        txn.transition(TxnState::Committed);

        info!(%key, "transaction committed");
        Ok(CommitOutcome {
            overall: StatusCode::Success,
            per_attribute,
            effective_timeout_ms,
        })
    }

    /// Roll back the transaction, discarding staged values unconditionally
    ///
    /// Never touches the store and never fails due to attribute content.
    #[instrument(skip(self), fields(%owner, %endpoint))]
    pub async fn rollback(&self, owner: &OwnerId, endpoint: EndpointId) -> TxnResult<()> {
        let key = TxnKey::new(owner.clone(), endpoint);
        let mut inner = self.inner.write().await;
        let now_ms = self.time.now_ms();

        if inner
            .registry
            .get(&key)
            .is_some_and(|t| t.is_expired(now_ms))
        {
            self.expire_locked(&mut inner, &key);
        }

        let Some(mut txn) = inner.registry.remove(&key) else {
            return Err(TxnError::NoOpenTransaction {
                owner: owner.to_string(),
                endpoint,
            });
        };
        inner.sweeper.cancel(&key);
        txn.transition(TxnState::RolledBack);

        debug!(%key, "transaction rolled back");
        Ok(())
    }

    /// Read an attribute as seen by the requester
    ///
    /// Isolation: a requester with an open transaction governing the
    /// attribute observes its own staged value; everyone else observes the
    /// last-committed store value.
    pub async fn read(
        &self,
        requester: &OwnerId,
        endpoint: EndpointId,
        attribute: AttributeHandle,
    ) -> TxnResult<AttributeValue> {
        {
            let inner = self.inner.read().await;
            let now_ms = self.time.now_ms();
            let key = TxnKey::new(requester.clone(), endpoint);
            if let Some(txn) = inner.registry.get(&key) {
                if txn.governs(attribute) && !txn.is_expired(now_ms) {
                    if let Some(staged) = txn.staged_value(attribute) {
                        return Ok(staged.clone());
                    }
                }
            }
        }

        self.store
            .get(endpoint, attribute)
            .await
            .map_err(|e| match e {
                StoreError::AttributeNotFound {
                    endpoint,
                    attribute,
                } => TxnError::UnknownAttribute {
                    endpoint,
                    attribute,
                },
                other => TxnError::Store(other),
            })
    }

    /// Implicitly abort every open transaction held by a disconnected owner
    ///
    /// Governed attributes become free immediately. Returns the number of
    /// transactions aborted.
    #[instrument(skip(self), fields(%owner))]
    pub async fn handle_session_lost(&self, owner: &OwnerId) -> usize {
        let mut inner = self.inner.write().await;
        let keys = inner.registry.keys_owned_by(owner);
        for key in &keys {
            if let Some(mut txn) = inner.registry.remove(key) {
                inner.sweeper.cancel(key);
                txn.transition(TxnState::Aborted);
                info!(%key, "transaction aborted: session lost");
            }
        }
        keys.len()
    }

    /// Expire every transaction whose deadline has elapsed
    ///
    /// Same discard semantics as rollback. Idempotent: expiring an
    /// already-removed transaction is a harmless no-op, so racing an owner's
    /// commit/rollback is safe.
    pub async fn expire_due(&self) -> Vec<TxnKey> {
        let mut inner = self.inner.write().await;
        let now_ms = self.time.now_ms();
        self.expire_due_locked(&mut inner, now_ms)
    }

    /// Spawn the background sweeper loop
    ///
    /// Sleeps until the earliest scheduled deadline (bounded by the
    /// configured interval) and expires whatever is due. Abort the returned
    /// handle to stop the loop.
    pub fn spawn_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let coordinator = self;
        tokio::spawn(async move {
            loop {
                let interval_ms = coordinator.sweeper_config.interval_ms;
                let sleep_ms = {
                    let inner = coordinator.inner.read().await;
                    let now_ms = coordinator.time.now_ms();
                    inner
                        .sweeper
                        .next_deadline_ms()
                        .map(|d| d.saturating_sub(now_ms).clamp(1, interval_ms))
                        .unwrap_or(interval_ms)
                };
                coordinator.time.sleep_ms(sleep_ms).await;

                let expired = coordinator.expire_due().await;
                if !expired.is_empty() {
                    debug!(count = expired.len(), "sweeper expired transactions");
                }
            }
        })
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn expire_due_locked(&self, inner: &mut Inner, now_ms: u64) -> Vec<TxnKey> {
        let mut expired = Vec::new();
        for key in inner.sweeper.pop_due(now_ms) {
            let expires_at_ms = inner.registry.get(&key).map(|t| t.expires_at_ms());
            match expires_at_ms {
                Some(at) if at <= now_ms => {
                    if let Some(mut txn) = inner.registry.remove(&key) {
                        txn.transition(TxnState::Expired);
                        warn!(%key, "transaction expired");
                        expired.push(key);
                    }
                }
                Some(at) => {
                    // Idle refresh pushed the expiry past the scheduled
                    // entry; re-arm at the current expiry
                    inner.sweeper.schedule(at, key);
                }
                None => {
                    // Stale entry: commit/rollback/abort already won
                }
            }
        }
        expired
    }

    fn expire_locked(&self, inner: &mut Inner, key: &TxnKey) {
        if let Some(mut txn) = inner.registry.remove(key) {
            inner.sweeper.cancel(key);
            txn.transition(TxnState::Expired);
            warn!(%key, "transaction expired");
        }
    }

    /// Validate one staged value against the store and produce the value to
    /// flush: unassigned handles assigned, null built-in flags resolved.
    ///
    /// Returns a human-readable reason on content-validation failure.
    async fn prepare_commit_value(
        &self,
        next_handles: &mut HashMap<(EndpointId, AttributeHandle), RecordHandle>,
        endpoint: EndpointId,
        attribute: AttributeHandle,
        staged: AttributeValue,
    ) -> Result<AttributeValue, String> {
        staged.validate().map_err(|e| e.to_string())?;

        let stored = self
            .store
            .get(endpoint, attribute)
            .await
            .map_err(|e| e.to_string())?;
        let capacity = self
            .store
            .capacity(endpoint, attribute)
            .await
            .map_err(|e| e.to_string())?;

        if staged.len() > capacity {
            return Err(format!(
                "record count {} exceeds capacity {}",
                staged.len(),
                capacity
            ));
        }

        // Every assigned handle must refer to an existing record, and an
        // explicit built-in flag may not contradict the store
        for record in &staged {
            if let Some(handle) = record.handle {
                let Some(existing) = stored.find(handle) else {
                    return Err(format!("unknown record handle {}", handle));
                };
                if let (Some(submitted), Some(current)) = (record.built_in, existing.built_in) {
                    if submitted != current {
                        return Err(format!(
                            "built-in flag mismatch for record {}",
                            handle
                        ));
                    }
                }
            }
        }

        // Built-in records are immutable as a unit: they cannot be dropped
        for existing in &stored {
            if existing.is_built_in() {
                let kept = existing
                    .handle
                    .map(|h| staged.contains_handle(h))
                    .unwrap_or(false);
                if !kept {
                    return Err("built-in record cannot be removed".to_string());
                }
            }
        }

        // Assign handles and resolve null built-in flags
        let next = next_handles
            .entry((endpoint, attribute))
            .or_insert_with(|| {
                stored
                    .max_assigned_handle()
                    .map(|h| h.next())
                    .unwrap_or(RecordHandle::FIRST)
            });
        if let Some(max) = stored.max_assigned_handle() {
            if *next <= max {
                *next = max.next();
            }
        }

        let mut prepared = staged;
        for record in prepared.records_mut() {
            match record.handle {
                Some(handle) => {
                    if record.built_in.is_none() {
                        // Inherit the store's prior flag for this record
                        record.built_in = stored.find(handle).and_then(|r| r.built_in);
                    }
                }
                None => {
                    record.handle = Some(*next);
                    *next = next.next();
                    // New records are never built-in; validate() rejected
                    // explicit true above
                    record.built_in = Some(record.built_in.unwrap_or(false));
                }
            }
        }

        debug_assert!(prepared.is_fully_assigned());
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearth_core::GovernedRecord;
    use hearth_store::MemoryAttributeStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    const EP: EndpointId = EndpointId::new(1);
    const SCHEDULES: AttributeHandle = AttributeHandle::new(0x50);
    const PRESETS: AttributeHandle = AttributeHandle::new(0x51);
    const UNKNOWN: AttributeHandle = AttributeHandle::new(0xEE);

    /// Test clock with manually controllable time
    #[derive(Debug)]
    struct TestClock {
        time_ms: AtomicU64,
    }

    impl TestClock {
        fn new(initial_ms: u64) -> Self {
            Self {
                time_ms: AtomicU64::new(initial_ms),
            }
        }

        fn advance(&self, ms: u64) {
            self.time_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TimeProvider for TestClock {
        fn now_ms(&self) -> u64 {
            self.time_ms.load(Ordering::SeqCst)
        }

        async fn sleep_ms(&self, ms: u64) {
            self.time_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    fn owner(n: u32) -> OwnerId {
        OwnerId::new(format!("owner-{}", n)).unwrap()
    }

    fn seed_record(handle: u64, built_in: bool) -> GovernedRecord {
        GovernedRecord::with_handle(
            RecordHandle::new(handle),
            Some(built_in),
            json!({"name": format!("r{}", handle)}),
        )
    }

    fn test_config() -> HearthConfig {
        HearthConfig {
            txn: TxnConfig::for_testing(),
            sweeper: SweeperConfig::for_testing(),
        }
    }

    async fn setup() -> (Arc<MemoryAttributeStore>, Arc<TestClock>, AtomicWriteCoordinator) {
        let store = Arc::new(MemoryAttributeStore::new());
        store
            .declare(
                EP,
                SCHEDULES,
                8,
                AttributeValue::new(vec![seed_record(1, false)]),
            )
            .await
            .unwrap();
        store
            .declare(EP, PRESETS, 4, AttributeValue::empty())
            .await
            .unwrap();

        let clock = Arc::new(TestClock::new(1_000));
        let coordinator = AtomicWriteCoordinator::with_providers(
            store.clone(),
            test_config(),
            clock.clone(),
        );
        (store, clock, coordinator)
    }

    #[tokio::test]
    async fn test_begin_clamps_timeout() {
        let (_store, _clock, coordinator) = setup().await;

        let outcome = coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 1)
            .await
            .unwrap();
        assert_eq!(outcome.overall, StatusCode::Success);
        assert_eq!(outcome.effective_timeout_ms, 50);

        coordinator.rollback(&owner(1), EP).await.unwrap();

        let outcome = coordinator
            .begin(&owner(1), EP, &[SCHEDULES], u64::MAX)
            .await
            .unwrap();
        assert_eq!(outcome.effective_timeout_ms, 5_000);
    }

    #[tokio::test]
    async fn test_begin_zero_timeout_uses_default() {
        let (_store, _clock, coordinator) = setup().await;

        let outcome = coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        assert_eq!(outcome.effective_timeout_ms, 1_000);
    }

    #[tokio::test]
    async fn test_begin_twice_same_owner_already_active() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        let result = coordinator.begin(&owner(1), EP, &[PRESETS], 0).await;
        assert!(matches!(result, Err(TxnError::AlreadyActive { .. })));
        assert_eq!(
            result.unwrap_err().status(),
            StatusCode::InvalidInState
        );
    }

    #[tokio::test]
    async fn test_begin_contended_attribute_busy() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        let result = coordinator
            .begin(&owner(2), EP, &[SCHEDULES, PRESETS], 0)
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, TxnError::AttributeBusy { .. }));
        assert_eq!(err.status(), StatusCode::Busy);
        assert!(err.is_retriable());

        // The failed begin must not have claimed the disjoint attribute
        coordinator
            .begin(&owner(3), EP, &[PRESETS], 0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_unknown_attribute_creates_nothing() {
        let (_store, _clock, coordinator) = setup().await;

        let outcome = coordinator
            .begin(&owner(1), EP, &[SCHEDULES, UNKNOWN], 0)
            .await
            .unwrap();
        assert_eq!(outcome.overall, StatusCode::Failure);
        assert_eq!(outcome.per_attribute[0].status, StatusCode::Success);
        assert_eq!(outcome.per_attribute[1].status, StatusCode::Failure);

        // No transaction was created, so commit finds nothing
        let result = coordinator.commit(&owner(1), EP).await;
        assert!(matches!(result, Err(TxnError::NoOpenTransaction { .. })));
    }

    #[tokio::test]
    async fn test_write_not_governed() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        let result = coordinator
            .write(&owner(1), EP, PRESETS, AttributeValue::empty())
            .await;
        assert!(matches!(result, Err(TxnError::NotGoverned { .. })));
        assert_eq!(
            result.unwrap_err().status(),
            StatusCode::InvalidInState
        );
    }

    #[tokio::test]
    async fn test_write_invalid_value_is_failure() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();

        // Unassigned record claiming built-in: rejected at write time
        let value = AttributeValue::new(vec![GovernedRecord {
            handle: None,
            built_in: Some(true),
            payload: json!({}),
        }]);
        let err = coordinator
            .write(&owner(1), EP, SCHEDULES, value)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::Failure);

        // Staged value unchanged: commit still succeeds with the snapshot
        let outcome = coordinator.commit(&owner(1), EP).await.unwrap();
        assert_eq!(outcome.overall, StatusCode::Success);
    }

    #[tokio::test]
    async fn test_commit_removing_built_in_fails_whole_commit() {
        let (store, _clock, coordinator) = setup().await;
        store
            .set(
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(1, true), seed_record(2, false)]),
            )
            .await
            .unwrap();

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES, PRESETS], 0)
            .await
            .unwrap();

        // Drop the built-in record: commit-time validation failure
        coordinator
            .write(
                &owner(1),
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(2, false)]),
            )
            .await
            .unwrap();
        coordinator
            .write(
                &owner(1),
                EP,
                PRESETS,
                AttributeValue::new(vec![GovernedRecord::new(json!({"name": "p"}))]),
            )
            .await
            .unwrap();

        let outcome = coordinator.commit(&owner(1), EP).await.unwrap();
        assert_eq!(outcome.overall, StatusCode::Failure);
        let schedules_status = outcome
            .per_attribute
            .iter()
            .find(|s| s.attribute == SCHEDULES)
            .unwrap();
        let presets_status = outcome
            .per_attribute
            .iter()
            .find(|s| s.attribute == PRESETS)
            .unwrap();
        assert_eq!(schedules_status.status, StatusCode::Failure);
        assert_eq!(presets_status.status, StatusCode::Success);

        // No attribute was flushed, including the valid one
        assert_eq!(store.get(EP, SCHEDULES).await.unwrap().len(), 2);
        assert!(store.get(EP, PRESETS).await.unwrap().is_empty());

        // The transaction was destroyed, not left open
        let result = coordinator.commit(&owner(1), EP).await;
        assert!(matches!(result, Err(TxnError::NoOpenTransaction { .. })));
    }

    #[tokio::test]
    async fn test_commit_built_in_mismatch_fails() {
        let (store, _clock, coordinator) = setup().await;
        store
            .set(
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(1, true)]),
            )
            .await
            .unwrap();

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        coordinator
            .write(
                &owner(1),
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(1, false)]),
            )
            .await
            .unwrap();

        let outcome = coordinator.commit(&owner(1), EP).await.unwrap();
        assert_eq!(outcome.overall, StatusCode::Failure);
    }

    #[tokio::test]
    async fn test_commit_unknown_record_handle_fails() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        coordinator
            .write(
                &owner(1),
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(1, false), seed_record(42, false)]),
            )
            .await
            .unwrap();

        let outcome = coordinator.commit(&owner(1), EP).await.unwrap();
        assert_eq!(outcome.overall, StatusCode::Failure);
    }

    #[tokio::test]
    async fn test_commit_over_capacity_fails() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[PRESETS], 0)
            .await
            .unwrap();
        let records = (0..5)
            .map(|i| GovernedRecord::new(json!({"name": format!("p{}", i)})))
            .collect();
        coordinator
            .write(&owner(1), EP, PRESETS, AttributeValue::new(records))
            .await
            .unwrap();

        let outcome = coordinator.commit(&owner(1), EP).await.unwrap();
        assert_eq!(outcome.overall, StatusCode::Failure);
    }

    #[tokio::test]
    async fn test_handle_assignment_is_monotonic_across_commits() {
        let (store, _clock, coordinator) = setup().await;
        let owner_id = owner(1);

        // First commit: add one record, handle 2 (seed holds handle 1)
        coordinator.begin(&owner_id, EP, &[SCHEDULES], 0).await.unwrap();
        coordinator
            .write(
                &owner_id,
                EP,
                SCHEDULES,
                AttributeValue::new(vec![
                    seed_record(1, false),
                    GovernedRecord::new(json!({"name": "a"})),
                ]),
            )
            .await
            .unwrap();
        coordinator.commit(&owner_id, EP).await.unwrap();
        let value = store.get(EP, SCHEDULES).await.unwrap();
        assert_eq!(value.records()[1].handle, Some(RecordHandle::new(2)));

        // Remove it, then add another: handle 2 is never reused
        coordinator.begin(&owner_id, EP, &[SCHEDULES], 0).await.unwrap();
        coordinator
            .write(
                &owner_id,
                EP,
                SCHEDULES,
                AttributeValue::new(vec![seed_record(1, false)]),
            )
            .await
            .unwrap();
        coordinator.commit(&owner_id, EP).await.unwrap();

        coordinator.begin(&owner_id, EP, &[SCHEDULES], 0).await.unwrap();
        coordinator
            .write(
                &owner_id,
                EP,
                SCHEDULES,
                AttributeValue::new(vec![
                    seed_record(1, false),
                    GovernedRecord::new(json!({"name": "b"})),
                ]),
            )
            .await
            .unwrap();
        coordinator.commit(&owner_id, EP).await.unwrap();

        let value = store.get(EP, SCHEDULES).await.unwrap();
        assert_eq!(value.records()[1].handle, Some(RecordHandle::new(3)));
    }

    #[tokio::test]
    async fn test_read_isolation_between_owners() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        coordinator
            .write(&owner(1), EP, SCHEDULES, AttributeValue::empty())
            .await
            .unwrap();

        // Owner sees its staged value
        let staged = coordinator.read(&owner(1), EP, SCHEDULES).await.unwrap();
        assert!(staged.is_empty());

        // Another owner sees the last-committed value
        let committed = coordinator.read(&owner(2), EP, SCHEDULES).await.unwrap();
        assert_eq!(committed.len(), 1);
    }

    #[tokio::test]
    async fn test_session_lost_aborts_and_frees() {
        let (_store, _clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 0)
            .await
            .unwrap();
        assert_eq!(coordinator.handle_session_lost(&owner(1)).await, 1);

        // Attributes are free for another owner immediately
        coordinator
            .begin(&owner(2), EP, &[SCHEDULES], 0)
            .await
            .unwrap();

        // Aborting again is a no-op
        assert_eq!(coordinator.handle_session_lost(&owner(1)).await, 0);
    }

    #[tokio::test]
    async fn test_expire_due_is_idempotent() {
        let (_store, clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 100)
            .await
            .unwrap();

        clock.advance(200);
        let expired = coordinator.expire_due().await;
        assert_eq!(expired.len(), 1);

        // Second sweep finds nothing
        assert!(coordinator.expire_due().await.is_empty());
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_write_and_commit() {
        let (store, clock, coordinator) = setup().await;

        coordinator
            .begin(&owner(1), EP, &[SCHEDULES], 100)
            .await
            .unwrap();
        clock.advance(200);

        // No sweeper ran, but the deadline has elapsed
        let err = coordinator
            .write(&owner(1), EP, SCHEDULES, AttributeValue::empty())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidInState);

        let result = coordinator.commit(&owner(1), EP).await;
        assert!(matches!(result, Err(TxnError::NoOpenTransaction { .. })));

        assert_eq!(store.get(EP, SCHEDULES).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_reschedules_after_writes() {
        let store = Arc::new(MemoryAttributeStore::new());
        store
            .declare(EP, SCHEDULES, 8, AttributeValue::empty())
            .await
            .unwrap();
        let clock = Arc::new(TestClock::new(1_000));
        let mut config = test_config();
        config.txn.idle_timeout_ms = Some(500);
        let coordinator =
            AtomicWriteCoordinator::with_providers(store.clone(), config, clock.clone());
        let owner_id = owner(1);

        coordinator
            .begin(&owner_id, EP, &[SCHEDULES], 5_000)
            .await
            .unwrap();

        // Keep the transaction alive past the first idle deadline
        clock.advance(400);
        coordinator
            .write(&owner_id, EP, SCHEDULES, AttributeValue::empty())
            .await
            .unwrap();

        // The originally scheduled idle deadline elapses, but the refresh
        // moved expiry out: the sweep re-arms instead of expiring
        clock.advance(200);
        assert!(coordinator.expire_due().await.is_empty());

        // With no further writes the refreshed idle deadline fires
        clock.advance(400);
        assert_eq!(coordinator.expire_due().await.len(), 1);
    }
}
