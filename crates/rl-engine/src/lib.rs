//! Record engine for the Record Ledger.
//!
//! One generic engine serves every record kind. A kind is described by an
//! immutable [`RecordSchema`](rl_types::RecordSchema); the engine validates
//! inbound JSON against it, stamps ownership fields, persists through a
//! [`LedgerStore`](rl_store::LedgerStore) transaction, and emits a change
//! event.
//!
//! # Flow
//!
//! ```text
//! JSON ──► RecordValidator ──► RecordManager ──► LedgerStore ──► EventSink
//!                                   │
//!                 QueryPaginator ◄──┴──► HistoryReconstructor
//! ```
//!
//! [`Dispatcher`] sits in front of the managers and maps named actions with
//! positional string arguments onto them, returning an [`Envelope`].

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod identity;
pub mod invoke;
pub mod kinds;
pub mod manager;
pub mod paginate;
pub mod registry;
pub mod validator;

pub use config::{EngineConfig, PagingConfig};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{EmittedEvent, EventError, EventLog, EventSink, FanOut, TracingSink};
pub use history::{HistoryEntry, HistoryReconstructor};
pub use identity::{
    AnonymousIdentity, EnvIdentity, IdentityError, IdentityResolver, StaticIdentity,
    UNKNOWN_CALLER,
};
pub use invoke::{Action, Dispatcher, Envelope, Request};
pub use manager::{BulkFailure, BulkOutcome, Created, RecordManager, UpdateTarget, Updated};
pub use paginate::{Page, QueryPaginator, QueryRecord};
pub use registry::SchemaRegistry;
pub use validator::{RecordValidator, Verdict};
