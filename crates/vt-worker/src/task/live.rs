//! Live stream transcode.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use vt_models::{Stage, Status, TaskId, TaskRequest, TaskType};

use super::{direct_command, Task, TaskContext, TaskState};
use crate::error::TaskResult;

/// Relays a live source through FFmpeg.
///
/// Live sources report `Duration: N/A`, so progress sits at 100 for the
/// whole run and the task ends when the stream does.
pub struct LiveTask {
    state: TaskState,
    ctx: Arc<TaskContext>,
}

impl LiveTask {
    pub fn new(request: TaskRequest, ctx: Arc<TaskContext>) -> Self {
        Self {
            state: TaskState::new(request, TaskType::Live),
            ctx,
        }
    }
}

#[async_trait]
impl Task for LiveTask {
    fn id(&self) -> Option<TaskId> {
        self.state.id()
    }

    fn task_type(&self) -> TaskType {
        TaskType::Live
    }

    fn validate_request(&mut self) -> TaskResult<TaskId> {
        self.state.validate()
    }

    async fn start(&self, cancel: watch::Receiver<bool>) -> TaskResult<()> {
        self.state.enter(Stage::Started);
        self.state.enter(Stage::Transcoding);
        let cmd = direct_command(&self.state.request);
        let result = self.state.run_ffmpeg(&self.ctx, &cmd, cancel).await;
        self.state.finish(result)
    }

    fn status(&self) -> Status {
        self.state.snapshot()
    }
}
