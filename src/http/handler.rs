//! Acknowledgement handler.
//!
//! Every `GET` (and `HEAD`), whatever the path, is answered with 200 `OK`.
//! Reaching this handler means the client completed the mutual-TLS
//! handshake; the certificate has already been logged.

use axum::{http::StatusCode, routing::get, Router};
use tower_http::trace::TraceLayer;

/// Body returned to every accepted request.
pub const ACK_BODY: &str = "OK";

/// Build the application router.
pub fn router() -> Router {
    Router::new()
        .route("/", get(acknowledge))
        .route("/{*path}", get(acknowledge))
        .layer(TraceLayer::new_for_http())
}

async fn acknowledge() -> (StatusCode, &'static str) {
    (StatusCode::OK, ACK_BODY)
}
