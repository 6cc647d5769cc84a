//! Transaction error types
//!
//! TigerStyle: Explicit error variants with context, plus the mapping onto
//! the protocol status vocabulary.

use hearth_core::{AttributeHandle, EndpointId, StatusCode};
use hearth_store::StoreError;
use thiserror::Error;

/// Transaction-manager errors
#[derive(Error, Debug)]
pub enum TxnError {
    /// Begin with no attributes requested
    #[error("transaction must govern at least one attribute")]
    EmptyAttributeSet,

    /// Begin requesting more attributes than a transaction may govern
    #[error("requested {count} attributes exceeds limit of {limit}")]
    TooManyAttributes { count: usize, limit: usize },

    /// Owner already has an open transaction at this endpoint
    #[error("owner {owner} already has an open transaction at {endpoint}")]
    AlreadyActive { owner: String, endpoint: EndpointId },

    /// Attribute is governed by a different owner's open transaction
    #[error("attribute {attribute} at {endpoint} is governed by {holder}")]
    AttributeBusy {
        endpoint: EndpointId,
        attribute: AttributeHandle,
        holder: String,
    },

    /// Write issued with no open transaction governing the attribute
    #[error("write to {attribute} at {endpoint} outside an open transaction")]
    WriteOutsideTransaction {
        endpoint: EndpointId,
        attribute: AttributeHandle,
    },

    /// Open transaction exists but does not govern the attribute
    #[error("attribute {attribute} at {endpoint} is not governed by this transaction")]
    NotGoverned {
        endpoint: EndpointId,
        attribute: AttributeHandle,
    },

    /// Commit/rollback with no active transaction for the scope
    #[error("no open transaction for owner {owner} at {endpoint}")]
    NoOpenTransaction { owner: String, endpoint: EndpointId },

    /// Submitted value failed content validation
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    /// Read of an attribute the endpoint does not expose
    #[error("unknown attribute {attribute} at {endpoint}")]
    UnknownAttribute {
        endpoint: EndpointId,
        attribute: AttributeHandle,
    },

    /// Store rejected an operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Internal coordinator error
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl TxnError {
    /// Create an invalid value error
    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Map this error onto the protocol status vocabulary
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AlreadyActive { .. }
            | Self::WriteOutsideTransaction { .. }
            | Self::NotGoverned { .. } => StatusCode::InvalidInState,
            Self::AttributeBusy { .. } => StatusCode::Busy,
            Self::NoOpenTransaction { .. } => StatusCode::NotFound,
            Self::EmptyAttributeSet
            | Self::TooManyAttributes { .. }
            | Self::InvalidValue { .. }
            | Self::UnknownAttribute { .. }
            | Self::Store(_)
            | Self::Internal { .. } => StatusCode::Failure,
        }
    }

    /// Whether a client may retry the request unchanged after backoff
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::AttributeBusy { .. })
    }
}

/// Result type for transaction operations
pub type TxnResult<T> = std::result::Result<T, TxnError>;
