//! Error types for Hearth
//!
//! TigerStyle: Explicit error types with context, using thiserror.

use thiserror::Error;

/// Result type alias for Hearth core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hearth core error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Identity Errors
    // =========================================================================
    #[error("Invalid owner ID: {id}, reason: {reason}")]
    InvalidOwnerId { id: String, reason: String },

    #[error("Owner ID too long: {length} bytes exceeds limit of {limit} bytes")]
    OwnerIdTooLong { length: usize, limit: usize },

    // =========================================================================
    // Value Errors
    // =========================================================================
    #[error("Invalid attribute value: {reason}")]
    InvalidAttributeValue { reason: String },

    #[error("Too many records: {count} exceeds limit of {limit}")]
    TooManyRecords { count: usize, limit: usize },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid attribute value error
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidAttributeValue {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_value("duplicate handle 3");
        assert!(err.to_string().contains("duplicate handle 3"));
    }

    #[test]
    fn test_config_error_names_field() {
        let err = Error::InvalidConfiguration {
            field: "txn.timeout_min_ms".into(),
            reason: "must be positive".into(),
        };
        assert!(err.to_string().contains("txn.timeout_min_ms"));
    }
}
