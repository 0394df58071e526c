//! HTTP invocation shim for the Record Ledger.
//!
//! Exposes the engine's actions as `POST /v1/invoke/{kind}/{action}` with a
//! `{"args": [...]}` body. Each request runs in its own ledger transaction
//! on the blocking pool and answers with the engine's response envelope;
//! the HTTP status mirrors the envelope's error tag. The caller identity is
//! taken from the `x-caller` header.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{status_for, ServerError, ServerResult};
pub use handler::CALLER_HEADER;
pub use router::{build_router, recording_sink, AppState};
pub use server::RlServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app() -> (Router, AppState) {
        let state = AppState::in_memory();
        (build_router(state.clone(), &ServerConfig::default()), state)
    }

    fn header(id: &str) -> String {
        json!({
            "id": id,
            "entity": "E1",
            "name": "CLI1",
            "type": "T",
            "category": "8",
            "created": "100"
        })
        .to_string()
    }

    async fn invoke(app: &Router, path: &str, caller: Option<&str>, args: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller);
        }
        let response = app
            .clone()
            .oneshot(builder.body(Body::from(json!({ "args": args }).to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app();
        let (status, body) = get_json(&app, "/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (app, _) = app();
        let (status, body) = get_json(&app, "/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "rl-server");
        assert!(body["kinds"].as_array().unwrap().contains(&json!("header")));
        assert!(body["actions"].as_array().unwrap().contains(&json!("queryPaginated")));
    }

    #[tokio::test]
    async fn kinds_endpoint_lists_schemas() {
        let (app, _) = app();
        let (_, body) = get_json(&app, "/v1/kinds").await;
        let kinds: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["kind"].as_str().unwrap())
            .collect();
        assert_eq!(kinds.len(), 7);
        assert!(kinds.contains(&"scrub_token"));
    }

    #[tokio::test]
    async fn create_then_duplicate() {
        let (app, state) = app();
        let (status, body) =
            invoke(&app, "/v1/invoke/header/create", Some("alice"), json!([header("H1")])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "true");
        assert_eq!(body["data"]["record"]["creator"], "alice");
        assert_eq!(state.ledger.len(), 1);

        let (status, body) =
            invoke(&app, "/v1/invoke/header/create", Some("bob"), json!([header("H1")])).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], "false");
        assert_eq!(body["error"], "DUPLICATE_KEY");
    }

    #[tokio::test]
    async fn missing_caller_is_unknown() {
        let (app, _) = app();
        let (_, body) = invoke(&app, "/v1/invoke/header/create", None, json!([header("H1")])).await;
        assert_eq!(body["data"]["record"]["creator"], "Unknown.");
    }

    #[tokio::test]
    async fn error_statuses() {
        let (app, _) = app();
        let (status, body) = invoke(&app, "/v1/invoke/invoice/create", None, json!(["{}"])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "UNKNOWN_KIND");

        let (status, _) = invoke(&app, "/v1/invoke/header/queryById", None, json!(["H9"])).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            invoke(&app, "/v1/invoke/header/create", None, json!([r#"{"id":"H1"}"#])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn invalid_json_body_gets_an_envelope() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/invoke/header/create")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "false");
        assert_eq!(body["error"], "MALFORMED_INPUT");
        assert_eq!(body["trxnID"].as_str().unwrap().len(), 64);
        assert!(state.ledger.is_empty());
    }

    #[tokio::test]
    async fn paginated_query_accepts_numeric_page_size() {
        let (app, _) = app();
        for i in 0..3 {
            invoke(&app, "/v1/invoke/header/create", None, json!([header(&format!("H{i}"))])).await;
        }
        let (status, body) =
            invoke(&app, "/v1/invoke/header/queryPaginated", None, json!(["{}", 2])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["recordsCount"], 2);
    }

    #[tokio::test]
    async fn events_endpoint_shows_recent_events() {
        let (app, _) = app();
        invoke(&app, "/v1/invoke/header/create", None, json!([header("H1")])).await;
        invoke(
            &app,
            "/v1/invoke/header/updateStatus",
            None,
            json!(["H1", r#"{"status":"I"}"#]),
        )
        .await;
        let (_, body) = get_json(&app, "/v1/events?limit=1").await;
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "UPDATE_HEADER");
    }
}
