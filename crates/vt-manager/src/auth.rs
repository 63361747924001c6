//! HTTP Basic auth for the status and task endpoints.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response};
use axum::middleware::Next;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::{Authorization, HeaderMapExt};
use tracing::warn;

use crate::config::ManagerConfig;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// Compare two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

/// Check a presented username and password against the configured pair.
///
/// Nothing matches while either configured half is empty.
pub fn credentials_match(config: &ManagerConfig, user: &str, pass: &str) -> bool {
    // Both halves are always compared
    let user_ok = constant_time_compare(user.as_bytes(), config.user.as_bytes());
    let pass_ok = constant_time_compare(pass.as_bytes(), config.pass.as_bytes());
    config.has_credentials() & user_ok & pass_ok
}

/// Reject requests without valid Basic credentials.
pub async fn basic_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let authorized = request
        .headers()
        .typed_get::<Authorization<Basic>>()
        .map(|auth| credentials_match(&state.config, auth.username(), auth.password()))
        .unwrap_or(false);

    if !authorized {
        warn!(uri = %request.uri(), "Rejected request with missing or invalid credentials");
        metrics::record_auth_failure();
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ManagerConfig {
        ManagerConfig {
            user: "vt".to_string(),
            pass: "secret".to_string(),
            ..ManagerConfig::default()
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"secret", b"secret"));
        assert!(!constant_time_compare(b"secret", b"secreT"));
        assert!(!constant_time_compare(b"secret", b"secrets"));
        assert!(constant_time_compare(b"", b""));
    }

    #[test]
    fn test_credentials_match() {
        let config = config();
        assert!(credentials_match(&config, "vt", "secret"));
        assert!(!credentials_match(&config, "vt", "wrong"));
        assert!(!credentials_match(&config, "other", "secret"));
        assert!(!credentials_match(&config, "", ""));
    }

    #[test]
    fn test_unconfigured_credentials_reject_everything() {
        let config = ManagerConfig::default();
        assert!(!config.has_credentials());
        assert!(!credentials_match(&config, "", ""));
        assert!(!credentials_match(&config, "vt", "secret"));

        let half = ManagerConfig {
            user: "vt".to_string(),
            ..ManagerConfig::default()
        };
        assert!(!credentials_match(&half, "vt", ""));
    }
}
