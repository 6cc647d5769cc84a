//! Transaction state machine and staged values
//!
//! TigerStyle: Explicit states, guarded transitions, absolute deadline
//! arithmetic.
//!
//! A [`WriteTransaction`] owns the staged (uncommitted) copy of every
//! attribute it governs. Writes mutate the staged copy only; the store is
//! touched exactly once, at commit. The deadline is a hard upper bound fixed
//! at begin; the optional inactivity sub-deadline can only tighten it.

use hearth_core::{AttributeHandle, AttributeValue, EndpointId, OwnerId, StatusCode};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// TxnKey
// =============================================================================

/// Transaction scope: at most one open transaction per key
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TxnKey {
    /// Client/session identity
    pub owner: OwnerId,
    /// Endpoint carrying the governed attributes
    pub endpoint: EndpointId,
}

impl TxnKey {
    /// Create a transaction key
    pub fn new(owner: OwnerId, endpoint: EndpointId) -> Self {
        Self { owner, endpoint }
    }
}

impl fmt::Display for TxnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.owner, self.endpoint)
    }
}

// =============================================================================
// TxnState
// =============================================================================

/// Transaction lifecycle states
///
/// ```text
/// Open ──> Committing ──> Committed
///   │           └───────> RolledBack   (commit-time validation failure)
///   ├──> RolledBack                    (owner rollback)
///   ├──> Expired                       (deadline elapsed)
///   └──> Aborted                       (session lost)
/// ```
///
/// No transitions are permitted out of a terminal state. `Expired` is
/// externally identical to `RolledBack` (staged edits discarded) and is
/// distinguished for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting writes; can commit or roll back
    Open,
    /// Transient: commit-time validation pass in progress
    Committing,
    /// Terminal: staged values flushed to the store
    Committed,
    /// Terminal: staged values discarded by the owner or a failed commit
    RolledBack,
    /// Terminal: deadline elapsed with no commit/rollback
    Expired,
    /// Terminal: owner's session was lost
    Aborted,
}

impl TxnState {
    /// Whether this state permits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Committed | Self::RolledBack | Self::Expired | Self::Aborted
        )
    }

    /// Whether the transaction is accepting writes
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a transition to `next` is legal
    pub fn can_transition_to(&self, next: TxnState) -> bool {
        match self {
            Self::Open => matches!(
                next,
                Self::Committing | Self::RolledBack | Self::Expired | Self::Aborted
            ),
            Self::Committing => matches!(next, Self::Committed | Self::RolledBack),
            _ => false,
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled-back",
            Self::Expired => "expired",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// AttrOutcome
// =============================================================================

/// Per-attribute outcome tracked across the transaction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOutcome {
    /// No commit attempted yet
    Pending,
    /// Commit-time validation passed and the value was flushed
    Succeeded,
    /// Commit-time validation failed
    Failed,
}

impl AttrOutcome {
    /// Protocol status for this outcome
    pub fn status(&self) -> StatusCode {
        match self {
            // A pending attribute in a destroyed transaction reads as
            // success: it was snapshot-able and nothing went wrong with it.
            Self::Pending | Self::Succeeded => StatusCode::Success,
            Self::Failed => StatusCode::Failure,
        }
    }
}

// =============================================================================
// WriteTransaction
// =============================================================================

/// One open edit scope over a set of governed attributes
#[derive(Debug)]
pub struct WriteTransaction {
    key: TxnKey,
    /// Governed attributes in the order requested at begin
    governed: Vec<AttributeHandle>,
    /// Staged (uncommitted) value per governed attribute
    staged: HashMap<AttributeHandle, AttributeValue>,
    /// Per-attribute outcome, `Pending` until a commit attempt
    outcomes: HashMap<AttributeHandle, AttrOutcome>,
    created_at_ms: u64,
    /// Hard deadline; never extended after begin
    deadline_ms: u64,
    /// Server-clamped timeout actually applied, kept for audit reporting
    effective_timeout_ms: u64,
    /// Optional inactivity window; writes refresh the sub-deadline
    idle_timeout_ms: Option<u64>,
    /// Current inactivity sub-deadline, always <= deadline_ms
    idle_deadline_ms: Option<u64>,
    state: TxnState,
}

impl WriteTransaction {
    /// Create an open transaction from a store snapshot
    ///
    /// `staged` must hold exactly one entry per governed attribute.
    pub fn new(
        key: TxnKey,
        governed: Vec<AttributeHandle>,
        staged: HashMap<AttributeHandle, AttributeValue>,
        now_ms: u64,
        effective_timeout_ms: u64,
        idle_timeout_ms: Option<u64>,
    ) -> Self {
        // TigerStyle: preconditions
        assert!(!governed.is_empty(), "transaction must govern attributes");
        assert!(effective_timeout_ms > 0, "timeout must be positive");
        assert!(
            now_ms.checked_add(effective_timeout_ms).is_some(),
            "deadline would overflow"
        );
        assert_eq!(
            staged.len(),
            governed.len(),
            "staged snapshot must cover the governed set"
        );
        debug_assert!(governed.iter().all(|a| staged.contains_key(a)));

        let deadline_ms = now_ms + effective_timeout_ms;
        let idle_deadline_ms = idle_timeout_ms.map(|t| (now_ms + t).min(deadline_ms));
        let outcomes = governed.iter().map(|a| (*a, AttrOutcome::Pending)).collect();

        let txn = Self {
            key,
            governed,
            staged,
            outcomes,
            created_at_ms: now_ms,
            deadline_ms,
            effective_timeout_ms,
            idle_timeout_ms,
            idle_deadline_ms,
            state: TxnState::Open,
        };

        // TigerStyle: postconditions
        debug_assert!(txn.expires_at_ms() > now_ms);
        debug_assert!(txn.state.is_open());

        txn
    }

    /// Transaction scope key
    pub fn key(&self) -> &TxnKey {
        &self.key
    }

    /// Governed attributes in request order
    pub fn governed(&self) -> &[AttributeHandle] {
        &self.governed
    }

    /// Whether this transaction governs the attribute
    pub fn governs(&self, attribute: AttributeHandle) -> bool {
        self.governed.contains(&attribute)
    }

    /// Current lifecycle state
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Creation timestamp (Unix ms)
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// The server-clamped timeout applied at begin
    pub fn effective_timeout_ms(&self) -> u64 {
        self.effective_timeout_ms
    }

    /// Hard deadline (Unix ms)
    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    /// Earliest instant at which this transaction expires
    ///
    /// The inactivity sub-deadline can only tighten the hard deadline,
    /// never extend it.
    pub fn expires_at_ms(&self) -> u64 {
        self.idle_deadline_ms.unwrap_or(self.deadline_ms)
    }

    /// Whether the transaction has expired at the given time
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    /// Remaining time before expiry in milliseconds
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms().saturating_sub(now_ms)
    }

    /// Stage a value for a governed attribute, replacing any prior staging
    ///
    /// Refreshes the inactivity sub-deadline without extending the hard
    /// deadline.
    pub fn stage(&mut self, attribute: AttributeHandle, value: AttributeValue, now_ms: u64) {
        // TigerStyle: preconditions
        assert!(self.state.is_open(), "can only stage while open");
        assert!(self.governs(attribute), "attribute must be governed");

        self.staged.insert(attribute, value);
        self.touch(now_ms);

        // TigerStyle: postconditions
        debug_assert!(self.expires_at_ms() <= self.deadline_ms);
    }

    /// Refresh the inactivity sub-deadline
    pub fn touch(&mut self, now_ms: u64) {
        if let Some(idle_ms) = self.idle_timeout_ms {
            self.idle_deadline_ms = Some((now_ms.saturating_add(idle_ms)).min(self.deadline_ms));
        }
    }

    /// Staged value for a governed attribute
    pub fn staged_value(&self, attribute: AttributeHandle) -> Option<&AttributeValue> {
        self.staged.get(&attribute)
    }

    /// Consume the transaction, yielding its staged values
    pub fn into_staged(self) -> HashMap<AttributeHandle, AttributeValue> {
        self.staged
    }

    /// Record the commit-time outcome of one attribute
    pub fn mark(&mut self, attribute: AttributeHandle, outcome: AttrOutcome) {
        assert!(self.governs(attribute), "attribute must be governed");
        self.outcomes.insert(attribute, outcome);
    }

    /// Per-attribute statuses in governed order
    pub fn outcome_statuses(&self) -> Vec<(AttributeHandle, StatusCode)> {
        self.governed
            .iter()
            .map(|a| (*a, self.outcomes[a].status()))
            .collect()
    }

    /// Perform a guarded state transition
    ///
    /// Panics on an illegal transition; callers are expected to check the
    /// state machine before transitioning.
    pub fn transition(&mut self, next: TxnState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }
}
