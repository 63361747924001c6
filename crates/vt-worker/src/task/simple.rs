//! Direct source-to-destination transcode.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use vt_models::{Stage, Status, TaskId, TaskRequest, TaskType};

use super::{direct_command, Task, TaskContext, TaskState};
use crate::error::TaskResult;

/// Runs FFmpeg straight from `srcURL` to `dstURL`, both given to the encoder as-is.
pub struct SimpleVideoTask {
    state: TaskState,
    ctx: Arc<TaskContext>,
}

impl SimpleVideoTask {
    pub fn new(request: TaskRequest, ctx: Arc<TaskContext>) -> Self {
        Self {
            state: TaskState::new(request, TaskType::SimpleVideo),
            ctx,
        }
    }
}

#[async_trait]
impl Task for SimpleVideoTask {
    fn id(&self) -> Option<TaskId> {
        self.state.id()
    }

    fn task_type(&self) -> TaskType {
        TaskType::SimpleVideo
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

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::task::test_support::{context, fake_ffmpeg, recording_script};

    #[tokio::test]
    async fn test_runs_direct_command() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let ffmpeg = fake_ffmpeg(dir.path(), &recording_script(&args_file));
        let out = dir.path().join("out.mp4");

        let mut task = SimpleVideoTask::new(
            TaskRequest {
                src_url: "in.mkv".into(),
                dst_args: "-c:v libx264".into(),
                dst_url: out.display().to_string(),
                ..Default::default()
            },
            context(ffmpeg, dir.path().to_path_buf(), None),
        );
        task.validate_request().unwrap();

        let (_tx, rx) = watch::channel(false);
        task.start(rx).await.unwrap();

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert_eq!(args.trim(), format!("-i in.mkv -c:v libx264 {}", out.display()));
        assert!(out.exists());

        let status = task.status();
        assert_eq!(status.stage, Stage::Transcoding);
        assert_eq!(status.stats.percentage, 100);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_stage_moves_from_started_to_transcoding() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "exec sleep 30");

        let task = Arc::new(SimpleVideoTask::new(
            TaskRequest {
                task_id: Some(TaskId::new()),
                src_url: "in.mkv".into(),
                dst_url: "out.mp4".into(),
                ..Default::default()
            },
            context(ffmpeg, dir.path().to_path_buf(), None),
        ));
        assert_eq!(task.status().stage, Stage::Started);
        let created = task.status().stage_start;

        let (tx, rx) = watch::channel(false);
        let running = tokio::spawn({
            let task = Arc::clone(&task);
            async move { task.start(rx).await }
        });

        for _ in 0..100 {
            if task.status().stage == Stage::Transcoding {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let status = task.status();
        assert_eq!(status.stage, Stage::Transcoding);
        assert!(status.stage_start >= created);

        tx.send(true).unwrap();
        assert!(running.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_encoder_failure_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'Invalid argument' >&2\nexit 1");

        let task = SimpleVideoTask::new(
            TaskRequest {
                task_id: Some(TaskId::new()),
                src_url: "in.mkv".into(),
                dst_url: "out.mp4".into(),
                ..Default::default()
            },
            context(ffmpeg, dir.path().to_path_buf(), None),
        );

        let (_tx, rx) = watch::channel(false);
        let err = task.start(rx).await.unwrap_err();
        assert!(err.to_string().contains("FFmpeg"));
        assert!(task.status().error.is_some());
    }
}
