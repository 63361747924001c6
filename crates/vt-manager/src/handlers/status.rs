//! Job and worker status handlers.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;

use vt_models::{JobStatusRecord, WorkerRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Current status record of one job.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusRecord>> {
    state
        .store
        .job(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job with ID {} not found", job_id)))
}

/// Every connected worker keyed by worker ID.
pub async fn list_workers(State(state): State<AppState>) -> Json<HashMap<String, WorkerRecord>> {
    Json(state.store.workers().await)
}

pub async fn worker_status(
    State(state): State<AppState>,
    Path(worker_id): Path<String>,
) -> ApiResult<Json<WorkerRecord>> {
    state
        .store
        .worker(&worker_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Worker with ID {} not found", worker_id)))
}
