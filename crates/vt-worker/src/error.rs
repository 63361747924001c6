//! Worker error types.

use thiserror::Error;
use vt_models::TaskId;

pub type TaskResult<T> = Result<T, TaskError>;
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors from validating or running a single task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Task {0} is already running")]
    DuplicateJob(TaskId),

    #[error("Task has no ID")]
    NotValidated,

    #[error("Task {task_id} failed: {source}")]
    Execution {
        task_id: TaskId,
        #[source]
        source: Box<TaskError>,
    },

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Object store not configured")]
    StoreUnavailable,

    #[error("Completion notification failed: {0}")]
    Notification(String),

    #[error(transparent)]
    Media(#[from] vt_media::MediaError),

    #[error(transparent)]
    Storage(#[from] vt_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    pub fn execution(task_id: TaskId, source: TaskError) -> Self {
        Self::Execution {
            task_id,
            source: Box::new(source),
        }
    }

    /// True when the task stopped because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            TaskError::Media(e) => e.is_cancelled(),
            TaskError::Execution { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Errors from the worker process itself.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Sync channel error: {0}")]
    Sync(String),

    #[error("Queue error: {0}")]
    Queue(#[from] vt_queue::QueueError),

    #[error("Media error: {0}")]
    Media(#[from] vt_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vt_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }
}
