//! Progress stats and per-task status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::task::{TaskId, TaskType};

/// Duration sentinel for sources with no known length (live inputs).
pub const INDETERMINATE_DURATION: i64 = -1;

/// Progress figures derived from encoder output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Source length in seconds, 0 while unknown, -1 when indeterminate
    pub duration: i64,
    /// Progress 0-100
    pub percentage: u8,
    pub frame: u64,
    pub fps: f64,
    pub bitrate: String,
    pub size: String,
    /// Encoded position as reported by the encoder (HH:MM:SS)
    pub time: String,
}

impl Stats {
    pub fn is_indeterminate(&self) -> bool {
        self.duration == INDETERMINATE_DURATION
    }
}

/// Execution stage of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Started,
    /// Fetching the source ahead of encoding. Current tasks let FFmpeg
    /// read the source directly and go from `Started` to `Transcoding`.
    Downloading,
    Transcoding,
    Uploading,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Started => "started",
            Stage::Downloading => "downloading",
            Stage::Transcoding => "transcoding",
            Stage::Uploading => "uploading",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one task's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(rename = "taskID", skip_serializing_if = "Option::is_none", default)]
    pub task_id: Option<TaskId>,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub stage: Stage,
    pub stage_start: DateTime<Utc>,
    pub stats: Stats,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl Status {
    pub fn new(task_id: Option<TaskId>, task_type: TaskType) -> Self {
        Self {
            task_id,
            task_type,
            stage: Stage::Started,
            stage_start: Utc::now(),
            stats: Stats::default(),
            error: None,
        }
    }

    /// Move to a new stage, restarting the stage clock.
    pub fn enter_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_start = Utc::now();
    }

    /// Estimate time left in the current stage from elapsed time and percentage.
    ///
    /// Returns `None` before any progress and for indeterminate sources.
    pub fn eta(&self, now: DateTime<Utc>) -> Option<Duration> {
        let pct = u64::from(self.stats.percentage);
        if pct == 0 || self.stats.is_indeterminate() {
            return None;
        }
        if pct >= 100 {
            return Some(Duration::ZERO);
        }

        let elapsed = (now - self.stage_start).to_std().ok()?;
        let elapsed_ms = elapsed.as_millis() as u64;
        Some(Duration::from_millis(elapsed_ms * (100 - pct) / pct))
    }
}

/// Aggregate published by a worker on every status tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    #[serde(rename = "workerID")]
    pub worker_id: String,
    pub tasks_enabled: Vec<TaskType>,
    pub current_tasks: Vec<Status>,
}
