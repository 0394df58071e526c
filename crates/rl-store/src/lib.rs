//! Ledger state store for the Record Ledger.
//!
//! The record engine never talks to a database directly. It consumes the
//! [`LedgerStore`] trait, which models one ledger transaction: point reads
//! and writes by key, selector ("rich") queries with bookmark pagination,
//! and the full mutation history of a key.
//!
//! [`StateLedger`] is the reference implementation. It keeps current state
//! in a sorted map, keeps every write in per-key history, and can be made
//! durable with a write-ahead log ([`StateLedger::open`]).
//!
//! # Design Rules
//!
//! 1. One [`LedgerTx`] per top-level operation; its id and timestamp stamp
//!    every history entry it writes.
//! 2. Writes apply immediately, so later reads in the same transaction see
//!    them.
//! 3. Query results come back in key order. The store never re-sorts by
//!    value.
//! 4. History is append-only. A delete appends a tombstone.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod ledger;
pub mod query;
pub mod traits;
pub mod wal;

pub use config::LedgerConfig;
pub use error::{StoreError, StoreResult};
pub use ledger::{LedgerTx, StateLedger};
pub use query::{QueryDoc, Selector};
pub use traits::{HistoryIter, HistoryRecord, KeyValue, KvIter, LedgerStore, PageMeta};
pub use wal::{LedgerWrite, Recovery, SyncMode, WriteAheadLog};
