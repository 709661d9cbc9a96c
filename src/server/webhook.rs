//! Webhook HTTP entry points.
//!
//! Thin axum adapters over [`HookHandler::handle`]: extract the GitHub
//! headers and raw body, dispatch, and convert the outcome to a response.
//! The request body is read fully before any processing so the signature is
//! computed over exactly the delivered bytes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;

/// Header carrying the event kind.
const HEADER_EVENT: &str = "x-github-event";
/// Header carrying the HMAC signature.
const HEADER_SIGNATURE: &str = "x-hub-signature";

/// `POST /events/github`
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, &headers, &body).await
}

/// `POST /events/github/{app}/{inst}`
///
/// Deployments that multiplex several Apps point each at its own URL; the
/// payload still carries the authoritative App and installation ids, so the
/// path segments are only logged.
pub async fn webhook_path_handler(
    State(state): State<AppState>,
    Path((app, inst)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    debug!(app = %app, installation = %inst, "delivery on app-scoped path");
    dispatch(&state, &headers, &body).await
}

async fn dispatch(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Response {
    let event_type = header_str(headers, HEADER_EVENT).unwrap_or_default();
    let signature = header_str(headers, HEADER_SIGNATURE);

    match state.handler().handle(event_type, signature, body).await {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
