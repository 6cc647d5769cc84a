//! Hearth Core
//!
//! Core types, errors, and constants for the Hearth attribute-transaction
//! manager.
//!
//! # Overview
//!
//! Hearth governs edits to collection-valued attributes on a smart-device
//! endpoint: direct writes to a governed attribute are rejected, and clients
//! edit through explicit transactions that commit, roll back, or expire as a
//! unit.
//!
//! # TigerStyle
//!
//! This crate follows [TigerStyle](https://github.com/tigerbeetle/tigerbeetle/blob/main/docs/TIGER_STYLE.md)
//! engineering principles:
//! - Safety > Performance > Developer Experience
//! - Explicit limits with big-endian naming (e.g., `TXN_TIMEOUT_MS_MAX`)
//! - Assertions on preconditions and postconditions

pub mod attribute;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod status;
pub mod telemetry;

pub use attribute::{
    AttributeHandle, AttributeValue, EndpointId, GovernedRecord, OwnerId, RecordHandle,
};
pub use config::{HearthConfig, SweeperConfig, TxnConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use io::{TimeProvider, WallClockTime};
pub use status::StatusCode;
pub use telemetry::{init_telemetry, TelemetryConfig};
