use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rl_engine::ErrorKind;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("engine error: {0}")]
    Engine(#[from] rl_engine::EngineError),

    #[error("store error: {0}")]
    Store(#[from] rl_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// HTTP status for an engine error tag.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedInput
        | ErrorKind::ValidationFailed
        | ErrorKind::UnknownKind
        | ErrorKind::UnknownAction => StatusCode::BAD_REQUEST,
        ErrorKind::DuplicateKey => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StoreFailure | ErrorKind::EventEmissionFailure | ErrorKind::Config => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Engine(e) => status_for(e.kind()),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self, "request failed");
        (status, Json(json!({ "status": "false", "message": self.to_string() }))).into_response()
    }
}
