//! Prometheus metrics for the manager.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vt_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vt_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vt_http_requests_in_flight";
    pub const AUTH_FAILURES_TOTAL: &str = "vt_auth_failures_total";

    // Task metrics
    pub const TASKS_SUBMITTED_TOTAL: &str = "vt_tasks_submitted_total";

    // Sync channel metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "vt_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "vt_ws_connections_active";
    pub const SYNC_MESSAGES_TOTAL: &str = "vt_sync_messages_total";
    pub const SYNC_MESSAGES_REJECTED_TOTAL: &str = "vt_sync_messages_rejected_total";

    // Tidier metrics
    pub const TIDIER_DEMOTED_TOTAL: &str = "vt_tidier_demoted_total";
    pub const TIDIER_DELETED_TOTAL: &str = "vt_tidier_deleted_total";
    pub const JOBS_TRACKED: &str = "vt_jobs_tracked";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_auth_failure() {
    counter!(names::AUTH_FAILURES_TOTAL).increment(1);
}

/// Record a task accepted for publishing.
pub fn record_task_submitted(task_type: &str) {
    let labels = [("type", task_type.to_string())];
    counter!(names::TASKS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

/// Update active sync connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record a sync message routed to the store.
pub fn record_sync_message(header: &str) {
    let labels = [("header", header.to_string())];
    counter!(names::SYNC_MESSAGES_TOTAL, &labels).increment(1);
}

pub fn record_sync_message_rejected() {
    counter!(names::SYNC_MESSAGES_REJECTED_TOTAL).increment(1);
}

/// Record the result of one tidy sweep.
pub fn record_tidy(demoted: usize, deleted: usize, remaining: usize) {
    counter!(names::TIDIER_DEMOTED_TOTAL).increment(demoted as u64);
    counter!(names::TIDIER_DELETED_TOTAL).increment(deleted as u64);
    gauge!(names::JOBS_TRACKED).set(remaining as f64);
}

/// Collapse per-resource IDs so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    for prefix in ["/status/job/", "/status/worker/"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if !rest.is_empty() {
                return format!("{}:id", prefix);
            }
        }
    }
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
