use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// RL invocation server.
pub struct RlServer {
    config: ServerConfig,
    state: AppState,
}

impl RlServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let state = state.with_default_caller(config.default_caller.clone());
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            durable = self.state.ledger.is_durable(),
            "RL server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = RlServer::new(ServerConfig::default(), AppState::in_memory());
        assert_eq!(server.config().bind_addr, "127.0.0.1:7054".parse().unwrap());
        assert!(server.state().default_caller.is_none());
    }

    #[test]
    fn default_caller_flows_into_state() {
        let config = ServerConfig {
            default_caller: Some("gateway".into()),
            ..ServerConfig::default()
        };
        let server = RlServer::new(config, AppState::in_memory());
        assert_eq!(server.state().default_caller.as_deref(), Some("gateway"));
        let _router = server.router();
    }
}
