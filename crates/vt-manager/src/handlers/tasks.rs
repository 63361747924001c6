//! Task submission handlers.
//!
//! Each endpoint decodes a [`TaskRequest`], assigns it a fresh ID, publishes
//! it as started and publishes it on the routing key for its task type.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use vt_models::{TaskIdentification, TaskRequest, TaskType};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

type Created = (StatusCode, Json<TaskIdentification>);

/// Transcode a file or stream straight from source URL to destination URL.
pub async fn submit_simple_video(State(state): State<AppState>, body: Bytes) -> ApiResult<Created> {
    submit(&state, TaskType::SimpleVideo, &body).await
}

/// Fetch from the CDN, transcode locally, upload back.
pub async fn submit_vod(State(state): State<AppState>, body: Bytes) -> ApiResult<Created> {
    submit(&state, TaskType::Vod, &body).await
}

/// Relay a live source to a new endpoint.
pub async fn submit_live(State(state): State<AppState>, body: Bytes) -> ApiResult<Created> {
    submit(&state, TaskType::Live, &body).await
}

fn submitted_detail(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::SimpleVideo => "Simple Video Job Sent to Processing",
        TaskType::Vod => "VOD Job Sent to Processing",
        TaskType::Live => "Live Job Sent to Processing",
    }
}

async fn submit(state: &AppState, task_type: TaskType, body: &[u8]) -> ApiResult<Created> {
    let mut request: TaskRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid task body: {}", e)))?;
    let task_id = request.validate()?;

    // Workers may report on the job before publishing returns
    state
        .store
        .submit_job(task_id.as_str(), submitted_detail(task_type))
        .await;
    if let Err(e) = state.broker.publish_task(task_type, &request).await {
        state.store.remove_job(task_id.as_str()).await;
        return Err(e.into());
    }

    metrics::record_task_submitted(task_type.as_str());
    info!(task_id = %task_id, task_type = %task_type, "Task submitted");

    Ok((
        StatusCode::CREATED,
        Json(TaskIdentification::encoding(task_id)),
    ))
}
