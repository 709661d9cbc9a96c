//! HTTP server for the gateway.
//!
//! # Endpoints
//!
//! - `POST /events/github` - GitHub webhook sink
//! - `POST /events/github/{app}/{inst}` - webhook sink with App/installation
//!   path hints (accepted for compatibility; routing happens on the payload)
//! - `GET /healthz` - liveness probe, returns `200 "OK"`

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::healthz_handler;
pub use webhook::{webhook_handler, webhook_path_handler};

use crate::webhooks::HookHandler;

/// Shared application state, passed to handlers via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<HookHandler>,
}

impl AppState {
    pub fn new(handler: Arc<HookHandler>) -> Self {
        AppState { handler }
    }

    pub fn handler(&self) -> &HookHandler {
        &self.handler
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/events/github", post(webhook_handler))
        .route("/events/github/{app}/{inst}", post(webhook_path_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::store::InMemoryBuildStore;
    use crate::types::Project;
    use crate::webhooks::signature::{compute_signature, format_signature_header};
    use crate::webhooks::{GatewayOptions, HookHandler};

    const SECRET: &[u8] = b"asdf";

    fn test_state() -> (AppState, Arc<InMemoryBuildStore>) {
        let store = Arc::new(InMemoryBuildStore::new());
        store.insert_project(Project::new("octocat/hello-world", "asdf"));
        let handler = HookHandler::new(
            Arc::clone(&store) as _,
            Vec::new(),
            GatewayOptions::default(),
        );
        (AppState::new(Arc::new(handler)), store)
    }

    fn push_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "ref": "refs/heads/changes",
            "deleted": false,
            "head_commit": {"id": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c"},
            "repository": {"name": "hello-world", "owner": {"login": "octocat"}},
        }))
        .unwrap()
    }

    fn webhook_request(uri: &str, event: &str, body: Vec<u8>, sign: bool) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-github-event", event);
        if sign {
            let signature = format_signature_header(&compute_signature(&body, SECRET));
            builder = builder.header("x-hub-signature", signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let (state, _) = test_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn valid_push_delivery_creates_build() {
        let (state, store) = test_state();
        let app = build_router(state);

        let request = webhook_request("/events/github", "push", push_body(), true);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "Complete");

        assert_eq!(store.builds().len(), 1);
        assert_eq!(store.builds()[0].build_type, "push");
    }

    #[tokio::test]
    async fn app_inst_path_variant_accepts_deliveries() {
        let (state, store) = test_state();
        let app = build_router(state);

        let request = webhook_request("/events/github/7/34", "push", push_body(), true);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.builds().len(), 1);
    }

    #[tokio::test]
    async fn unsigned_delivery_is_forbidden() {
        let (state, store) = test_state();
        let app = build_router(state);

        let request = webhook_request("/events/github", "push", push_body(), false);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.builds().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_is_ignored_with_200() {
        let (state, _) = test_state();
        let app = build_router(state);

        let request = webhook_request("/events/github", "funzone", b"{}".to_vec(), true);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "Ignored");
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (state, _) = test_state();
        let app = build_router(state);

        let request = webhook_request("/events/github", "ping", b"{}".to_vec(), false);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["message"], "OK");
    }

    #[tokio::test]
    async fn unknown_project_is_bad_request() {
        let store = Arc::new(InMemoryBuildStore::new());
        let handler = HookHandler::new(
            Arc::clone(&store) as _,
            Vec::new(),
            GatewayOptions::default(),
        );
        let app = build_router(AppState::new(Arc::new(handler)));

        let request = webhook_request("/events/github", "push", push_body(), true);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
