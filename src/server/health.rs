//! Health check endpoint.

use axum::http::StatusCode;

/// Liveness probe. Returns 200 if the server is accepting requests.
pub async fn healthz_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
