use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use rl_engine::{
    Dispatcher, EngineConfig, EventLog, EventSink, FanOut, SchemaRegistry, TracingSink,
};
use rl_store::{LedgerConfig, StateLedger};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler;

/// Shared state behind every route.
#[derive(Clone, Debug)]
pub struct AppState {
    pub ledger: Arc<StateLedger>,
    pub dispatcher: Arc<Dispatcher>,
    /// Recent events, served by `/v1/events`. Must also be a sink of the
    /// dispatcher for events to show up.
    pub events: Arc<EventLog>,
    pub default_caller: Option<String>,
}

impl AppState {
    pub fn new(ledger: Arc<StateLedger>, dispatcher: Arc<Dispatcher>, events: Arc<EventLog>) -> Self {
        Self {
            ledger,
            dispatcher,
            events,
            default_caller: None,
        }
    }

    /// In-memory ledger, builtin kinds, events recorded and traced.
    pub fn in_memory() -> Self {
        let events = Arc::new(EventLog::new());
        let dispatcher = Dispatcher::new(SchemaRegistry::builtin(), recording_sink(&events));
        Self::new(Arc::new(StateLedger::in_memory()), Arc::new(dispatcher), events)
    }

    /// Open the configured ledger and build a dispatcher over the builtin
    /// and configured kinds.
    pub fn open(ledger: &LedgerConfig, engine: &EngineConfig) -> ServerResult<Self> {
        let ledger = StateLedger::open(ledger)?;
        let events = Arc::new(EventLog::new());
        let dispatcher = Dispatcher::from_config(engine, recording_sink(&events))?;
        Ok(Self::new(Arc::new(ledger), Arc::new(dispatcher), events))
    }

    pub fn with_default_caller(mut self, caller: Option<String>) -> Self {
        self.default_caller = caller;
        self
    }
}

/// Sink that records into `log` and traces every event.
pub fn recording_sink(log: &Arc<EventLog>) -> Arc<dyn EventSink> {
    let log: Arc<dyn EventSink> = log.clone();
    Arc::new(FanOut::new(vec![log, Arc::new(TracingSink)]))
}

/// Build the axum router with all RL endpoints.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/kinds", get(handler::kinds_handler))
        .route("/v1/events", get(handler::events_handler))
        .route("/v1/invoke/:kind/:action", post(handler::invoke_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
