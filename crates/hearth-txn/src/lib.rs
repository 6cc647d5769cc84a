//! Hearth Transaction Manager
//!
//! Atomic attribute-transaction coordination for smart-device endpoints.
//!
//! # Overview
//!
//! Governed attributes hold ordered sequences of structured records (a
//! thermostat's schedule list, its preset list). Direct writes to such
//! attributes are categorically rejected; a client opens a transaction over
//! the attributes it wants to edit, stages writes against a private copy,
//! and commits or rolls back before the transaction's deadline. Expiry has
//! rollback semantics and is driven by a background sweeper plus lazy checks
//! on every operation.
//!
//! # Guarantees
//!
//! - At most one open transaction per (owner, endpoint) scope
//! - An attribute is governed by at most one owner at a time; contenders
//!   fail fast with `Busy`
//! - Commit is all-or-nothing across a transaction's attributes
//! - Exactly one of {commit, rollback, expire, abort} terminates a
//!   transaction; the losers of the race observe `NotFound`
//! - A reader never observes another owner's staged values

pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod sweeper;
pub mod transaction;

pub use coordinator::{AtomicWriteCoordinator, AttributeStatus, BeginOutcome, CommitOutcome};
pub use error::{TxnError, TxnResult};
pub use protocol::{AtomicRequest, AtomicResponse};
pub use registry::TransactionRegistry;
pub use sweeper::TimeoutSweeper;
pub use transaction::{AttrOutcome, TxnKey, TxnState, WriteTransaction};
