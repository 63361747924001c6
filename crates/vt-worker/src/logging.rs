//! Structured task logging.

use tracing::{error, info, warn, Span};
use vt_models::{TaskId, TaskType};

/// Logs task lifecycle events with the task ID and type attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    task_id: String,
    task_type: TaskType,
}

impl JobLogger {
    pub fn new(task_id: &TaskId, task_type: TaskType) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_type,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            task_type = %self.task_type,
            "Task started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            task_id = %self.task_id,
            task_type = %self.task_type,
            "Task warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            task_id = %self.task_id,
            task_type = %self.task_type,
            "Task error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            task_id = %self.task_id,
            task_type = %self.task_type,
            "Task completed: {}", message
        );
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Span carrying the task fields, for instrumenting the run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "task",
            task_id = %self.task_id,
            task_type = %self.task_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let id = TaskId::new();
        let logger = JobLogger::new(&id, TaskType::Vod);
        assert_eq!(logger.task_id(), id.as_str());
    }
}
