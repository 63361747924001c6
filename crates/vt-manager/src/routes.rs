//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::basic_auth;
use crate::handlers::{
    index, job_status, list_workers, ok, submit_live, submit_simple_video, submit_vod,
    worker_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;
use crate::ws::ws_sync;

/// Create the manager router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let status_routes = Router::new()
        .route("/status/job/:job_id", get(job_status))
        .route("/status/worker", get(list_workers))
        .route("/status/worker/:worker_id", get(worker_status));

    let task_routes = Router::new()
        .route("/task/video/simple", post(submit_simple_video))
        .route("/task/video/vod", post(submit_vod))
        .route("/task/video/live", post(submit_live));

    let protected_routes = Router::new()
        .merge(status_routes)
        .merge(task_routes)
        .layer(middleware::from_fn_with_state(state.clone(), basic_auth));

    let public_routes = Router::new()
        .route("/", get(index))
        .route("/ok", get(ok))
        .route("/ws", get(ws_sync));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
