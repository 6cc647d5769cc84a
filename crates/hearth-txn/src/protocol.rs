//! Protocol surface consumed by the transport collaborator
//!
//! The transport delivers `(owner, request)` tuples and carries back the
//! response; encoding is its concern, not ours. Errors never cross this
//! boundary as errors: every outcome is folded into the status vocabulary.

use crate::coordinator::{AtomicWriteCoordinator, BeginOutcome, CommitOutcome};
use hearth_core::{AttributeHandle, AttributeValue, EndpointId, OwnerId, StatusCode};
use serde::{Deserialize, Serialize};

/// Request delivered by the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtomicRequest {
    /// Open a transaction over a set of attributes
    BeginWrite {
        endpoint: EndpointId,
        attributes: Vec<AttributeHandle>,
        timeout_ms: u64,
    },
    /// Stage a value for a governed attribute
    Write {
        endpoint: EndpointId,
        attribute: AttributeHandle,
        value: AttributeValue,
    },
    /// Flush staged values to the store and destroy the transaction
    CommitWrite { endpoint: EndpointId },
    /// Discard staged values and destroy the transaction
    RollbackWrite { endpoint: EndpointId },
    /// Read an attribute as seen by the requester
    Read {
        endpoint: EndpointId,
        attribute: AttributeHandle,
    },
}

/// Response carried back by the transport layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtomicResponse {
    Begin(BeginOutcome),
    Write { status: StatusCode },
    Commit(CommitOutcome),
    Rollback { status: StatusCode },
    Read {
        status: StatusCode,
        value: Option<AttributeValue>,
    },
}

impl AtomicResponse {
    /// The response's overall status
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Begin(outcome) => outcome.overall,
            Self::Write { status } => *status,
            Self::Commit(outcome) => outcome.overall,
            Self::Rollback { status } => *status,
            Self::Read { status, .. } => *status,
        }
    }
}

impl AtomicWriteCoordinator {
    /// Handle one transport-delivered request
    pub async fn dispatch(&self, owner: &OwnerId, request: AtomicRequest) -> AtomicResponse {
        match request {
            AtomicRequest::BeginWrite {
                endpoint,
                attributes,
                timeout_ms,
            } => match self.begin(owner, endpoint, &attributes, timeout_ms).await {
                Ok(outcome) => AtomicResponse::Begin(outcome),
                Err(e) => AtomicResponse::Begin(BeginOutcome {
                    overall: e.status(),
                    per_attribute: Vec::new(),
                    effective_timeout_ms: 0,
                }),
            },
            AtomicRequest::Write {
                endpoint,
                attribute,
                value,
            } => {
                let status = match self.write(owner, endpoint, attribute, value).await {
                    Ok(()) => StatusCode::Success,
                    Err(e) => e.status(),
                };
                AtomicResponse::Write { status }
            }
            AtomicRequest::CommitWrite { endpoint } => {
                match self.commit(owner, endpoint).await {
                    Ok(outcome) => AtomicResponse::Commit(outcome),
                    Err(e) => AtomicResponse::Commit(CommitOutcome {
                        overall: e.status(),
                        per_attribute: Vec::new(),
                        effective_timeout_ms: 0,
                    }),
                }
            }
            AtomicRequest::RollbackWrite { endpoint } => {
                let status = match self.rollback(owner, endpoint).await {
                    Ok(()) => StatusCode::Success,
                    Err(e) => e.status(),
                };
                AtomicResponse::Rollback { status }
            }
            AtomicRequest::Read {
                endpoint,
                attribute,
            } => match self.read(owner, endpoint, attribute).await {
                Ok(value) => AtomicResponse::Read {
                    status: StatusCode::Success,
                    value: Some(value),
                },
                Err(e) => AtomicResponse::Read {
                    status: e.status(),
                    value: None,
                },
            },
        }
    }
}
