//! Time abstraction for deterministic testing
//!
//! TigerStyle: All deadline logic goes through an abstraction trait.
//!
//! Every component that reads the clock or sleeps MUST use [`TimeProvider`].
//! Production code uses [`WallClockTime`]; tests substitute manually-advanced
//! clocks so timeout expiry is deterministic and fast.

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider abstraction
///
/// Never use `std::time::SystemTime::now()` directly in components that
/// participate in deadline handling.
#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    /// Get current time in milliseconds since epoch
    fn now_ms(&self) -> u64;

    /// Sleep for the specified duration
    ///
    /// In production: actual tokio::time::sleep.
    /// In tests: typically advances a simulated clock and returns.
    async fn sleep_ms(&self, ms: u64);

    /// Get monotonic timestamp (for measuring durations)
    fn monotonic_ms(&self) -> u64 {
        self.now_ms()
    }
}

/// Production time provider using wall clock
#[derive(Debug, Clone, Default)]
pub struct WallClockTime;

impl WallClockTime {
    /// Create a new wall clock time provider
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeProvider for WallClockTime {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(tokio::time::Duration::from_millis(ms)).await;
    }
}
