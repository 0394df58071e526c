//! Foundation types for the Record Ledger (RL).
//!
//! This crate provides the declarative schema and record types shared by
//! every other RL crate. It carries no behavior beyond construction,
//! accessors, and (de)serialization; validation lives in `rl-engine`.
//!
//! # Key Types
//!
//! - [`EnumDomain`]: Named closed set of allowed string values
//! - [`FieldRule`]: One field's presence, integer, and domain predicates
//! - [`RecordSchema`]: Per-kind ordered rule list plus mutable/lookup fields
//! - [`Record`]: A JSON object record with engine-owned stamp fields
//! - [`LedgerTimestamp`]: Seconds + nanos transaction timestamp
//! - [`TxId`]: Ledger transaction identifier

pub mod domain;
pub mod error;
pub mod record;
pub mod schema;
pub mod temporal;
pub mod transaction;

pub use domain::EnumDomain;
pub use error::TypeError;
pub use record::{Record, CREATOR_FIELD, KIND_FIELD, UPDATED_BY_FIELD};
pub use schema::{FieldRule, RecordSchema, TimestampFields};
pub use temporal::LedgerTimestamp;
pub use transaction::TxId;
