//! Action routing and the response envelope.
//!
//! A [`Request`] names a kind, an action, and positional string arguments.
//! The [`Dispatcher`] builds a [`RecordManager`] for the kind, runs the
//! action inside the caller's transaction, and wraps the outcome in an
//! [`Envelope`]. Failures never escape as Rust errors from
//! [`Dispatcher::invoke`]; they become failure envelopes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rl_store::LedgerStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{EngineConfig, PagingConfig};
use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::events::EventSink;
use crate::history::HistoryEntry;
use crate::identity::IdentityResolver;
use crate::manager::{RecordManager, UpdateTarget};
use crate::registry::SchemaRegistry;

/// Invocable operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    CreateBulk,
    UpdateStatus,
    UpdateStatusBulk,
    QueryById,
    QueryBySelector,
    QueryPaginated,
    History,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Create,
        Action::CreateBulk,
        Action::UpdateStatus,
        Action::UpdateStatusBulk,
        Action::QueryById,
        Action::QueryBySelector,
        Action::QueryPaginated,
        Action::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateBulk => "createBulk",
            Self::UpdateStatus => "updateStatus",
            Self::UpdateStatusBulk => "updateStatusBulk",
            Self::QueryById => "queryById",
            Self::QueryBySelector => "queryBySelector",
            Self::QueryPaginated => "queryPaginated",
            Self::History => "history",
        }
    }

    /// Whether the action writes to the ledger.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::CreateBulk | Self::UpdateStatus | Self::UpdateStatusBulk
        )
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            Self::UpdateStatus => (1, 3),
            Self::QueryPaginated => (1, 3),
            _ => (1, 1),
        }
    }
}

impl FromStr for Action {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| EngineError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub kind: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Request {
    pub fn new<I, S>(kind: impl Into<String>, action: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: kind.into(),
            action: action.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Response envelope.
///
/// Success: `{"status":"true","data":...,"trxnID":"..."}`.
/// Failure: `{"status":"false","error":"<TAG>","message":"...","trxnID":"..."}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "trxnID")]
    pub trxn_id: String,
}

impl Envelope {
    pub fn success(data: Value, trxn_id: impl Into<String>) -> Self {
        Self {
            status: "true".into(),
            data: Some(data),
            error: None,
            message: None,
            trxn_id: trxn_id.into(),
        }
    }

    pub fn failure(err: &EngineError, trxn_id: impl Into<String>) -> Self {
        Self {
            status: "false".into(),
            data: None,
            error: Some(err.kind()),
            message: Some(err.to_string()),
            trxn_id: trxn_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "true"
    }
}

/// Routes requests to per-kind record managers.
pub struct Dispatcher {
    registry: SchemaRegistry,
    paging: PagingConfig,
    events: Arc<dyn EventSink>,
}

impl Dispatcher {
    pub fn new(registry: SchemaRegistry, events: Arc<dyn EventSink>) -> Self {
        Self {
            registry,
            paging: PagingConfig::default(),
            events,
        }
    }

    pub fn from_config(config: &EngineConfig, events: Arc<dyn EventSink>) -> EngineResult<Self> {
        Ok(Self::new(config.registry()?, events).with_paging(config.paging))
    }

    pub fn with_paging(mut self, paging: PagingConfig) -> Self {
        self.paging = paging;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// A manager for `kind` acting as the given caller.
    pub fn manager(
        &self,
        kind: &str,
        identity: Arc<dyn IdentityResolver>,
    ) -> EngineResult<RecordManager> {
        let schema = self.registry.get(kind)?;
        Ok(RecordManager::new(schema, identity, self.events.clone()).with_paging(self.paging))
    }

    /// Run `request` in the transaction `store` and wrap the outcome.
    pub fn invoke(
        &self,
        store: &dyn LedgerStore,
        identity: Arc<dyn IdentityResolver>,
        request: &Request,
    ) -> Envelope {
        let trxn_id = store.tx_id().to_string();
        match self.execute(store, identity, request) {
            Ok(data) => Envelope::success(data, trxn_id),
            Err(e) => {
                debug!(kind = %request.kind, action = %request.action, error = %e, "invocation failed");
                Envelope::failure(&e, trxn_id)
            }
        }
    }

    /// Run `request`, returning the success payload.
    pub fn execute(
        &self,
        store: &dyn LedgerStore,
        identity: Arc<dyn IdentityResolver>,
        request: &Request,
    ) -> EngineResult<Value> {
        let action: Action = request.action.parse()?;
        let manager = self.manager(&request.kind, identity)?;
        let args = &request.args;
        check_arity(action, args)?;
        debug!(
            kind = %request.kind,
            %action,
            write = action.is_write(),
            args = args.len(),
            tx = %store.tx_id().short(),
            "invoke"
        );

        match action {
            Action::Create => to_data(manager.create(store, args[0].as_bytes())?),
            Action::CreateBulk => to_data(manager.create_bulk(store, args[0].as_bytes())?),
            Action::UpdateStatus => {
                let updated = match args.as_slice() {
                    [body] => manager.update_status_addressed(store, body.as_bytes())?,
                    [id, body] => manager.update_status(
                        store,
                        &UpdateTarget::Id(id.clone()),
                        body.as_bytes(),
                    )?,
                    [field, value, body] => manager.update_status(
                        store,
                        &UpdateTarget::Lookup {
                            field: field.clone(),
                            value: value.clone(),
                        },
                        body.as_bytes(),
                    )?,
                    _ => return Err(arity_error(action, args.len())),
                };
                to_data(updated)
            }
            Action::UpdateStatusBulk => {
                to_data(manager.update_status_bulk(store, args[0].as_bytes())?)
            }
            Action::QueryById => Ok(manager.get(store, &args[0])?.into_value()),
            Action::QueryBySelector => to_data(manager.query_all(store, &args[0])?),
            Action::QueryPaginated => {
                let page_size = match args.get(1).map(|s| s.trim()) {
                    None | Some("") => 0,
                    Some(s) => s.parse::<u32>().map_err(|_| {
                        EngineError::MalformedInput(format!(
                            "page size must be a non-negative integer, got '{s}'"
                        ))
                    })?,
                };
                let bookmark = args.get(2).map(String::as_str).unwrap_or_default();
                to_data(manager.query(store, &args[0], page_size, bookmark)?)
            }
            Action::History => {
                let entries: Vec<HistoryEntry> =
                    manager.history(store, &args[0])?.collect::<EngineResult<_>>()?;
                to_data(entries)
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.registry.len())
            .field("paging", &self.paging)
            .finish()
    }
}

fn check_arity(action: Action, args: &[String]) -> EngineResult<()> {
    let (min, max) = action.arity();
    if args.len() < min || args.len() > max {
        return Err(arity_error(action, args.len()));
    }
    Ok(())
}

fn arity_error(action: Action, got: usize) -> EngineError {
    let (min, max) = action.arity();
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    EngineError::MalformedInput(format!(
        "{action} takes {expected} argument(s), got {got}"
    ))
}

fn to_data<T: Serialize>(value: T) -> EngineResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::MalformedInput(format!("response encoding: {e}")))
}
