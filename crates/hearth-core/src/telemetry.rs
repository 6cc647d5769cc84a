//! Telemetry and logging infrastructure
//!
//! Structured logging via `tracing`, initialized once per process.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name included in log output
    pub service_name: String,
    /// Log level filter (tracing-subscriber env-filter syntax)
    pub log_level: String,
    /// Whether to include span targets in output
    pub with_targets: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hearth".to_string(),
            log_level: "info".to_string(),
            with_targets: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads `RUST_LOG` for the level filter (default: "info").
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        Self {
            log_level,
            ..Default::default()
        }
    }
}

/// Initialize the global tracing subscriber
///
/// Returns an error if a subscriber is already installed or the filter
/// fails to parse.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).map_err(|e| Error::InvalidConfiguration {
        field: "telemetry.log_level".into(),
        reason: e.to_string(),
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_targets)
        .try_init()
        .map_err(|e| Error::internal(format!("telemetry init failed: {}", e)))?;

    tracing::debug!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
