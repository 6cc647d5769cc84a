//! Protocol status vocabulary
//!
//! Taxonomy shared by every response the transaction manager produces,
//! independent of wire encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code carried in protocol responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    /// Operation completed
    Success,
    /// Content validation failed (malformed or policy-violating records)
    Failure,
    /// Request is not permitted in the current transaction state,
    /// including any write issued outside an open transaction
    InvalidInState,
    /// Attribute is governed by another owner's open transaction;
    /// retryable by the client after backoff
    Busy,
    /// No active transaction for the requested scope
    NotFound,
    /// Reserved for the transport collaborator's own request deadlines;
    /// transaction expiry surfaces as `NotFound` on the next commit
    Timeout,
}

impl StatusCode {
    /// Whether this status indicates success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether a client may reasonably retry the request unchanged
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::InvalidInState => "INVALID_IN_STATE",
            Self::Busy => "BUSY",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_classification() {
        assert!(StatusCode::Success.is_success());
        assert!(!StatusCode::Failure.is_success());
        assert!(!StatusCode::NotFound.is_success());
    }

    #[test]
    fn test_only_busy_is_retriable() {
        assert!(StatusCode::Busy.is_retriable());
        assert!(!StatusCode::InvalidInState.is_retriable());
        assert!(!StatusCode::Failure.is_retriable());
        assert!(!StatusCode::Timeout.is_retriable());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::InvalidInState.to_string(), "INVALID_IN_STATE");
        assert_eq!(StatusCode::Busy.to_string(), "BUSY");
    }
}
