//! Timeout sweeper schedule
//!
//! TigerStyle: Ordered deadlines, idempotent expiry.
//!
//! The sweeper is a plain ordered schedule of `(deadline, key)` pairs; the
//! coordinator owns the clock and decides what expiry means. Entries may go
//! stale (the transaction committed, rolled back, or refreshed its idle
//! sub-deadline first); popping a stale entry is harmless because the
//! coordinator re-checks the transaction before expiring it.

use crate::transaction::TxnKey;
use std::collections::BTreeSet;

/// Ordered schedule of transaction deadlines
#[derive(Debug, Default)]
pub struct TimeoutSweeper {
    schedule: BTreeSet<(u64, TxnKey)>,
}

impl TimeoutSweeper {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scheduled deadlines
    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    /// Whether no deadlines are scheduled
    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Schedule a deadline for a transaction
    pub fn schedule(&mut self, deadline_ms: u64, key: TxnKey) {
        self.schedule.insert((deadline_ms, key));
    }

    /// Drop every entry for a transaction
    pub fn cancel(&mut self, key: &TxnKey) {
        self.schedule.retain(|(_, k)| k != key);
    }

    /// Earliest scheduled deadline, if any
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.schedule.iter().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every entry whose deadline has elapsed
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<TxnKey> {
        let mut due = Vec::new();
        loop {
            match self.schedule.pop_first() {
                Some((deadline, key)) if deadline <= now_ms => due.push(key),
                Some(entry) => {
                    // Not yet due; put it back and stop
                    self.schedule.insert(entry);
                    break;
                }
                None => break,
            }
        }

        debug_assert!(self
            .next_deadline_ms()
            .map_or(true, |deadline| deadline > now_ms));
        due
    }
}
