use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use rl_engine::{
    Action, AnonymousIdentity, EmittedEvent, EngineError, Envelope, IdentityResolver, Request,
    StaticIdentity,
};
use rl_store::LedgerStore;
use rl_types::RecordSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{status_for, ServerError, ServerResult};
use crate::router::AppState;

/// Header naming the caller recorded as `creator`/`updatedBy`.
pub const CALLER_HEADER: &str = "x-caller";

const DEFAULT_EVENT_LIMIT: usize = 50;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Body of an invocation: positional arguments. Non-string arguments are
/// passed on as their JSON text.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InvokeBody {
    #[serde(default)]
    pub args: Vec<Value>,
}

impl InvokeBody {
    /// An empty body means no arguments.
    fn parse(raw: &[u8]) -> Result<Self, EngineError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw)
            .map_err(|e| EngineError::MalformedInput(format!("invalid request body: {e}")))
    }

    fn into_args(self) -> Vec<String> {
        self.args
            .into_iter()
            .map(|arg| match arg {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    let kinds: Vec<&str> = state.dispatcher.registry().kinds().collect();
    let actions: Vec<&str> = Action::ALL.iter().map(Action::as_str).collect();
    Json(json!({
        "name": "rl-server",
        "version": env!("CARGO_PKG_VERSION"),
        "kinds": kinds,
        "actions": actions,
        "durable": state.ledger.is_durable(),
        "records": state.ledger.len(),
    }))
}

pub async fn kinds_handler(State(state): State<AppState>) -> Json<Vec<RecordSchema>> {
    Json(state.dispatcher.registry().schemas().cloned().collect())
}

pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EmittedEvent>> {
    Json(state.events.recent(query.limit.unwrap_or(DEFAULT_EVENT_LIMIT)))
}

/// `POST /v1/invoke/{kind}/{action}`: one ledger transaction per request,
/// run on the blocking pool. A body that is not an `{"args": [...]}` object
/// is answered with a `MALFORMED_INPUT` envelope.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Path((kind, action)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<Envelope>)> {
    let identity = caller_identity(&headers, state.default_caller.as_deref());

    let envelope = tokio::task::spawn_blocking(move || {
        let tx = state.ledger.begin();
        match InvokeBody::parse(&body) {
            Ok(body) => {
                let request = Request {
                    kind,
                    action,
                    args: body.into_args(),
                };
                state.dispatcher.invoke(&tx, identity, &request)
            }
            Err(e) => Envelope::failure(&e, tx.tx_id().to_string()),
        }
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?;

    let status = envelope.error.map(status_for).unwrap_or(StatusCode::OK);
    Ok((status, Json(envelope)))
}

fn caller_identity(headers: &HeaderMap, default_caller: Option<&str>) -> Arc<dyn IdentityResolver> {
    let from_header = headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    match from_header.or(default_caller) {
        Some(name) => Arc::new(StaticIdentity::new(name)),
        None => Arc::new(AnonymousIdentity),
    }
}
