//! Transcode task variants.
//!
//! A task is built from a broker payload by [`build_task`], keyed on the
//! routing tag, and then driven through the [`Task`] trait. Progress is kept
//! in a `watch` channel so [`Task::status`] can be read while
//! [`Task::start`] is running.

mod live;
mod simple;
mod vod;

pub use live::LiveTask;
pub use simple::SimpleVideoTask;
pub use vod::VodTask;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use vt_media::{FfmpegCommand, FfmpegRunner};
use vt_models::{Stage, Status, TaskId, TaskRequest, TaskType};
use vt_storage::ObjectStore;

use crate::config::WorkerConfig;
use crate::error::{TaskError, TaskResult};

/// A unit of transcode work.
#[async_trait]
pub trait Task: Send + Sync {
    /// `None` until validated.
    fn id(&self) -> Option<TaskId>;

    fn task_type(&self) -> TaskType;

    /// Check required fields and assign a fresh ID.
    fn validate_request(&mut self) -> TaskResult<TaskId>;

    /// Run to completion. Setting `cancel` to `true` kills the encoder.
    async fn start(&self, cancel: watch::Receiver<bool>) -> TaskResult<()>;

    /// Latest progress snapshot.
    fn status(&self) -> Status;
}

/// Collaborators shared by all tasks on a worker.
pub struct TaskContext {
    pub ffmpeg_path: PathBuf,
    pub ffmpeg_timeout_secs: Option<u64>,
    pub work_dir: PathBuf,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub api_endpoint: Option<String>,
    pub http: reqwest::Client,
}

impl TaskContext {
    pub fn new(config: &WorkerConfig, store: Option<Arc<dyn ObjectStore>>) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffmpeg_timeout_secs: config.ffmpeg_timeout_secs,
            work_dir: config.work_dir.clone(),
            store,
            api_endpoint: config.api_endpoint.clone(),
            http: reqwest::Client::new(),
        }
    }

    fn runner(&self, cancel: watch::Receiver<bool>) -> FfmpegRunner {
        let runner = FfmpegRunner::new(&self.ffmpeg_path).with_cancel(cancel);
        match self.ffmpeg_timeout_secs {
            Some(secs) => runner.with_timeout(secs),
            None => runner,
        }
    }

    fn store(&self) -> TaskResult<&Arc<dyn ObjectStore>> {
        self.store.as_ref().ok_or(TaskError::StoreUnavailable)
    }
}

/// Build the task variant for a routing tag from a JSON payload.
pub fn build_task(
    task_type: TaskType,
    payload: &[u8],
    ctx: Arc<TaskContext>,
) -> TaskResult<Box<dyn Task>> {
    let request: TaskRequest = serde_json::from_slice(payload)
        .map_err(|e| TaskError::validation(format!("invalid {} payload: {}", task_type, e)))?;

    Ok(match task_type {
        TaskType::SimpleVideo => Box::new(SimpleVideoTask::new(request, ctx)),
        TaskType::Vod => Box::new(VodTask::new(request, ctx)),
        TaskType::Live => Box::new(LiveTask::new(request, ctx)),
    })
}

/// Request and live status shared by every variant.
struct TaskState {
    request: TaskRequest,
    status: Arc<watch::Sender<Status>>,
}

impl TaskState {
    fn new(request: TaskRequest, task_type: TaskType) -> Self {
        let (status, _) = watch::channel(Status::new(request.task_id.clone(), task_type));
        Self {
            request,
            status: Arc::new(status),
        }
    }

    fn id(&self) -> Option<TaskId> {
        self.request.task_id.clone()
    }

    fn validate(&mut self) -> TaskResult<TaskId> {
        let id = self
            .request
            .validate()
            .map_err(|e| TaskError::validation(e.to_string()))?;
        let status_id = id.clone();
        self.status.send_modify(|s| s.task_id = Some(status_id));
        Ok(id)
    }

    fn enter(&self, stage: Stage) {
        self.status.send_modify(|s| s.enter_stage(stage));
    }

    fn snapshot(&self) -> Status {
        self.status.borrow().clone()
    }

    /// Record the outcome on the status before handing it back.
    fn finish(&self, result: TaskResult<()>) -> TaskResult<()> {
        if let Err(e) = &result {
            let message = e.to_string();
            self.status.send_modify(|s| s.error = Some(message));
        }
        result
    }

    async fn run_ffmpeg(
        &self,
        ctx: &TaskContext,
        cmd: &FfmpegCommand,
        cancel: watch::Receiver<bool>,
    ) -> TaskResult<()> {
        let status = Arc::clone(&self.status);
        ctx.runner(cancel)
            .run_with_progress(cmd, move |stats| status.send_modify(|s| s.stats = stats))
            .await?;
        Ok(())
    }
}

/// `ffmpeg {args} {srcArgs} -i {srcURL} {dstArgs} {dstURL}`
fn direct_command(request: &TaskRequest) -> FfmpegCommand {
    FfmpegCommand::new(&request.src_url, &request.dst_url)
        .global_args_str(&request.args)
        .input_args_str(&request.src_args)
        .output_args_str(&request.dst_args)
}
