//! Configuration for Hearth
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for a Hearth device endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HearthConfig {
    /// Transaction configuration
    #[serde(default)]
    pub txn: TxnConfig,

    /// Timeout sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl HearthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.txn.validate()?;
        self.sweeper.validate()?;
        Ok(())
    }
}

/// Transaction timeout policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnConfig {
    /// Lower clamp bound for client-requested timeouts (milliseconds)
    #[serde(default = "default_timeout_min_ms")]
    pub timeout_min_ms: u64,

    /// Upper clamp bound for client-requested timeouts (milliseconds)
    #[serde(default = "default_timeout_max_ms")]
    pub timeout_max_ms: u64,

    /// Timeout applied when a client requests zero (milliseconds)
    #[serde(default = "default_timeout_default_ms")]
    pub timeout_default_ms: u64,

    /// Optional inactivity sub-timeout (milliseconds)
    ///
    /// When set, a transaction with no writes for this long expires early.
    /// Each write refreshes the sub-timer; the hard deadline is never
    /// extended.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

fn default_timeout_min_ms() -> u64 {
    TXN_TIMEOUT_MS_MIN
}

fn default_timeout_max_ms() -> u64 {
    TXN_TIMEOUT_MS_MAX
}

fn default_timeout_default_ms() -> u64 {
    TXN_TIMEOUT_MS_DEFAULT
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            timeout_min_ms: default_timeout_min_ms(),
            timeout_max_ms: default_timeout_max_ms(),
            timeout_default_ms: default_timeout_default_ms(),
            idle_timeout_ms: None,
        }
    }
}

impl TxnConfig {
    /// Clamp a client-requested timeout into the configured range
    ///
    /// Zero means "let the device decide" and maps to the default.
    /// Out-of-range requests clamp silently rather than fail.
    pub fn clamp_timeout(&self, requested_ms: u64) -> u64 {
        debug_assert!(self.timeout_min_ms <= self.timeout_max_ms);

        let requested_ms = if requested_ms == 0 {
            self.timeout_default_ms
        } else {
            requested_ms
        };
        requested_ms.clamp(self.timeout_min_ms, self.timeout_max_ms)
    }

    /// Create config for testing with short timeouts
    pub fn for_testing() -> Self {
        Self {
            timeout_min_ms: 50,
            timeout_max_ms: 5_000,
            timeout_default_ms: 1_000,
            idle_timeout_ms: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_min_ms == 0 {
            return Err(Error::InvalidConfiguration {
                field: "txn.timeout_min_ms".into(),
                reason: "must be positive".into(),
            });
        }

        if self.timeout_min_ms > self.timeout_max_ms {
            return Err(Error::InvalidConfiguration {
                field: "txn.timeout_min_ms".into(),
                reason: format!(
                    "{} exceeds timeout_max_ms {}",
                    self.timeout_min_ms, self.timeout_max_ms
                ),
            });
        }

        if self.timeout_default_ms < self.timeout_min_ms
            || self.timeout_default_ms > self.timeout_max_ms
        {
            return Err(Error::InvalidConfiguration {
                field: "txn.timeout_default_ms".into(),
                reason: "must lie within [timeout_min_ms, timeout_max_ms]".into(),
            });
        }

        if let Some(idle_ms) = self.idle_timeout_ms {
            if idle_ms < TXN_IDLE_TIMEOUT_MS_MIN {
                return Err(Error::InvalidConfiguration {
                    field: "txn.idle_timeout_ms".into(),
                    reason: format!("{} below limit {}", idle_ms, TXN_IDLE_TIMEOUT_MS_MIN),
                });
            }
        }

        Ok(())
    }
}

/// Timeout sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Upper bound on time between sweeps (milliseconds)
    #[serde(default = "default_sweep_interval_ms")]
    pub interval_ms: u64,
}

fn default_sweep_interval_ms() -> u64 {
    SWEEP_INTERVAL_MS_DEFAULT
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl SweeperConfig {
    /// Create config for testing with a short interval
    pub fn for_testing() -> Self {
        Self { interval_ms: 10 }
    }

    fn validate(&self) -> Result<()> {
        if self.interval_ms < SWEEP_INTERVAL_MS_MIN || self.interval_ms > SWEEP_INTERVAL_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "sweeper.interval_ms".into(),
                reason: format!(
                    "{} outside [{}, {}]",
                    self.interval_ms, SWEEP_INTERVAL_MS_MIN, SWEEP_INTERVAL_MS_MAX
                ),
            });
        }
        Ok(())
    }
}
