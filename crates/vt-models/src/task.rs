//! Task submissions and routing tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing tag selecting a task variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "video/simple")]
    SimpleVideo,
    #[serde(rename = "video/vod")]
    Vod,
    #[serde(rename = "video/live")]
    Live,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [TaskType::SimpleVideo, TaskType::Vod, TaskType::Live];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SimpleVideo => "video/simple",
            TaskType::Vod => "video/vod",
            TaskType::Live => "video/live",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ModelError::UnknownTaskType(s.to_string()))
    }
}

/// Task payload as submitted over HTTP and carried on the broker.
///
/// `args` go before the source arguments, `src_args` before `-i`, and
/// `dst_args` before the destination. Argument strings are split on
/// whitespace when the command line is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "taskID", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub args: String,
    #[serde(rename = "srcArgs", default)]
    pub src_args: String,
    #[serde(rename = "srcURL", default)]
    pub src_url: String,
    #[serde(rename = "dstArgs", default)]
    pub dst_args: String,
    #[serde(rename = "dstURL", default)]
    pub dst_url: String,
}

impl TaskRequest {
    /// Check required fields and assign a fresh ID.
    ///
    /// Any caller-supplied ID is replaced. On failure the ID is left untouched.
    pub fn validate(&mut self) -> ModelResult<TaskId> {
        if self.src_url.trim().is_empty() {
            return Err(ModelError::MissingField("srcURL"));
        }
        if self.dst_url.trim().is_empty() {
            return Err(ModelError::MissingField("dstURL"));
        }
        let id = TaskId::new();
        self.task_id = Some(id.clone());
        Ok(id)
    }
}

/// Response body for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdentification {
    pub state: String,
    #[serde(rename = "taskID")]
    pub task_id: TaskId,
}

impl TaskIdentification {
    pub fn encoding(task_id: TaskId) -> Self {
        Self {
            state: "encoding".to_string(),
            task_id,
        }
    }
}
