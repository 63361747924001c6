//! Liveness handlers.

use axum::http::StatusCode;

/// Index page, just shows the manager is alive.
pub async fn index() -> String {
    format!("vt manager (v{})", env!("CARGO_PKG_VERSION"))
}

/// Health probe for other services.
pub async fn ok() -> StatusCode {
    StatusCode::OK
}
