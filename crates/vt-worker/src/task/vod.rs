//! Video-on-demand transcode between CDN buckets.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vt_media::FfmpegCommand;
use vt_models::{Stage, Status, TaskId, TaskRequest, TaskType};
use vt_storage::ObjectLocation;

use super::{Task, TaskContext, TaskState};
use crate::error::{TaskError, TaskResult};

/// Lifetime of the presigned source URL.
const PRESIGN_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Pulls `srcURL` (`bucket/key`) through a presigned URL, encodes to a local
/// file, uploads it to `dstURL` (`bucket/key`) and tells the web API.
pub struct VodTask {
    state: TaskState,
    ctx: Arc<TaskContext>,
}

impl VodTask {
    pub fn new(request: TaskRequest, ctx: Arc<TaskContext>) -> Self {
        Self {
            state: TaskState::new(request, TaskType::Vod),
            ctx,
        }
    }

    async fn run(&self, cancel: watch::Receiver<bool>) -> TaskResult<()> {
        let request = &self.state.request;
        let task_id = self.state.id().ok_or(TaskError::NotValidated)?;
        let src: ObjectLocation = request.src_url.parse()?;
        let dst: ObjectLocation = request.dst_url.parse()?;
        let store = self.ctx.store()?;

        let source_url = store.presign_get(&src, PRESIGN_TTL).await?;
        debug!(task_id = %task_id, "Presigned source {}", src);

        tokio::fs::create_dir_all(&self.ctx.work_dir).await?;
        let local = self.ctx.work_dir.join(dst.flat_file_name());

        self.state.enter(Stage::Transcoding);
        let cmd = FfmpegCommand::new(source_url, local.to_string_lossy())
            .global_args_str(&request.args)
            .input_args_str(&request.src_args)
            .output_args_str(&request.dst_args)
            .overwrite();

        if let Err(e) = self.state.run_ffmpeg(&self.ctx, &cmd, cancel).await {
            remove_quietly(&local).await;
            return Err(e);
        }

        self.state.enter(Stage::Uploading);
        if let Err(e) = store.upload_file(&local, &dst).await {
            remove_quietly(&local).await;
            return Err(e.into());
        }
        tokio::fs::remove_file(&local).await?;
        info!(task_id = %task_id, "Uploaded {}", dst);

        self.notify_finished(&task_id).await
    }

    /// Tell the web API the output is in place.
    async fn notify_finished(&self, task_id: &TaskId) -> TaskResult<()> {
        let Some(endpoint) = &self.ctx.api_endpoint else {
            return Ok(());
        };

        let url = format!(
            "{}/v1/internal/encoder/transcode_finished/{}",
            endpoint.trim_end_matches('/'),
            task_id
        );

        let response = self
            .ctx
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| TaskError::notification(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(TaskError::notification(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        debug!(task_id = %task_id, "Web API notified");
        Ok(())
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl Task for VodTask {
    fn id(&self) -> Option<TaskId> {
        self.state.id()
    }

    fn task_type(&self) -> TaskType {
        TaskType::Vod
    }

    fn validate_request(&mut self) -> TaskResult<TaskId> {
        self.state.validate()
    }

    async fn start(&self, cancel: watch::Receiver<bool>) -> TaskResult<()> {
        self.state.enter(Stage::Started);
        let result = self.run(cancel).await;
        self.state.finish(result)
    }

    fn status(&self) -> Status {
        self.state.snapshot()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::task::test_support::{context, fake_ffmpeg, recording_script, MemoryStore};
    use crate::task::TaskContext;
    use std::path::PathBuf;
    use vt_storage::ObjectStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vod_request(id: &TaskId) -> TaskRequest {
        TaskRequest {
            task_id: Some(id.clone()),
            src_url: "ingest/2024/show/raw.mkv".into(),
            dst_args: "-c:v libx264".into(),
            dst_url: "vod/2024/show/ep1.mp4".into(),
            ..Default::default()
        }
    }

    fn ctx_with_api(
        ffmpeg: PathBuf,
        work_dir: PathBuf,
        store: Arc<MemoryStore>,
        api: Option<String>,
    ) -> Arc<TaskContext> {
        let base = context(ffmpeg, work_dir, Some(store as Arc<dyn ObjectStore>));
        Arc::new(TaskContext {
            ffmpeg_path: base.ffmpeg_path.clone(),
            ffmpeg_timeout_secs: base.ffmpeg_timeout_secs,
            work_dir: base.work_dir.clone(),
            store: base.store.clone(),
            api_endpoint: api,
            http: reqwest::Client::new(),
        })
    }

    #[tokio::test]
    async fn test_vod_pipeline() {
        let server = MockServer::start().await;
        let id = TaskId::new();
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1/internal/encoder/transcode_finished/{}",
                id
            )))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let ffmpeg = fake_ffmpeg(dir.path(), &recording_script(&args_file));
        let work_dir = dir.path().join("work");
        let store = Arc::new(MemoryStore::default());

        let task = VodTask::new(
            vod_request(&id),
            ctx_with_api(ffmpeg, work_dir.clone(), store.clone(), Some(server.uri())),
        );

        let (_tx, rx) = watch::channel(false);
        task.start(rx).await.unwrap();

        let presigned = store.presigned.lock().unwrap().clone();
        assert_eq!(presigned.len(), 1);
        assert_eq!(presigned[0].0, ObjectLocation::new("ingest", "2024/show/raw.mkv"));
        assert_eq!(presigned[0].1, PRESIGN_TTL);

        let local = work_dir.join("2024-show-ep1.mp4");
        let args = std::fs::read_to_string(&args_file).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "-y -i https://cdn.test/ingest/2024/show/raw.mkv?sig=abc -c:v libx264 {}",
                local.display()
            )
        );

        let uploads = store.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].1, ObjectLocation::new("vod", "2024/show/ep1.mp4"));
        assert_eq!(uploads[0].2.trim(), "encoded");
        assert!(!local.exists(), "local output should be removed");

        assert_eq!(task.status().stage, Stage::Uploading);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_vod_notification_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), &recording_script(&dir.path().join("args")));
        let store = Arc::new(MemoryStore::default());
        let task = VodTask::new(
            vod_request(&TaskId::new()),
            ctx_with_api(ffmpeg, dir.path().join("work"), store, Some(server.uri())),
        );

        let (_tx, rx) = watch::channel(false);
        let err = task.start(rx).await.unwrap_err();
        assert!(matches!(err, TaskError::Notification(_)));
    }

    #[tokio::test]
    async fn test_vod_rejects_bad_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let mut request = vod_request(&TaskId::new());
        request.src_url = "no-key".into();

        let task = VodTask::new(
            request,
            ctx_with_api(dir.path().join("ffmpeg"), dir.path().to_path_buf(), store.clone(), None),
        );

        let (_tx, rx) = watch::channel(false);
        let err = task.start(rx).await.unwrap_err();
        assert!(matches!(err, TaskError::Storage(_)));
        assert!(store.presigned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vod_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let task = VodTask::new(
            vod_request(&TaskId::new()),
            context(dir.path().join("ffmpeg"), dir.path().to_path_buf(), None),
        );

        let (_tx, rx) = watch::channel(false);
        let err = task.start(rx).await.unwrap_err();
        assert!(matches!(err, TaskError::StoreUnavailable));
    }
}
