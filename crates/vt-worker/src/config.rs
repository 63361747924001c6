//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use vt_models::TaskType;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Task types this worker consumes
    pub tasks_enabled: Vec<TaskType>,
    /// Manager sync endpoint
    pub manager_url: String,
    /// Web API notified when a VOD upload finishes
    pub api_endpoint: Option<String>,
    /// Work directory for transcode outputs
    pub work_dir: PathBuf,
    /// FFmpeg binary (name on PATH or absolute path)
    pub ffmpeg_path: PathBuf,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Status fan-out interval
    pub status_interval: Duration,
    /// How long one broker read blocks
    pub receive_block: Duration,
    /// Back off after a broker error
    pub receive_error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tasks_enabled: vec![TaskType::Vod, TaskType::SimpleVideo],
            manager_url: "ws://localhost:7071/ws".to_string(),
            api_endpoint: None,
            work_dir: std::env::temp_dir().join("vt"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffmpeg_timeout_secs: None,
            status_interval: Duration::from_secs(2),
            receive_block: Duration::from_secs(1),
            receive_error_backoff: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tasks_enabled: std::env::var("VT_TASKS_ENABLED")
                .ok()
                .map(|s| parse_task_types(&s))
                .filter(|types| !types.is_empty())
                .unwrap_or(defaults.tasks_enabled),
            manager_url: std::env::var("VT_MANAGER_URL").unwrap_or(defaults.manager_url),
            api_endpoint: std::env::var("VT_WAPI_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            work_dir: std::env::var("VT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_path: std::env::var("VT_FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffmpeg_timeout_secs: std::env::var("VT_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            status_interval: Duration::from_secs(
                std::env::var("VT_STATUS_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            receive_block: Duration::from_millis(
                std::env::var("VT_RECEIVE_BLOCK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            receive_error_backoff: defaults.receive_error_backoff,
        }
    }

    /// Check URLs before anything connects.
    pub fn validate(&self) -> WorkerResult<()> {
        let manager = Url::parse(&self.manager_url)
            .map_err(|e| WorkerError::config_error(format!("VT_MANAGER_URL: {}", e)))?;
        if !matches!(manager.scheme(), "ws" | "wss") {
            return Err(WorkerError::config_error(
                "VT_MANAGER_URL must use ws:// or wss://",
            ));
        }

        if let Some(endpoint) = &self.api_endpoint {
            let api = Url::parse(endpoint)
                .map_err(|e| WorkerError::config_error(format!("VT_WAPI_ENDPOINT: {}", e)))?;
            if !matches!(api.scheme(), "http" | "https") {
                return Err(WorkerError::config_error(
                    "VT_WAPI_ENDPOINT must use http:// or https://",
                ));
            }
        }

        if self.tasks_enabled.is_empty() {
            return Err(WorkerError::config_error("no task types enabled"));
        }

        Ok(())
    }
}

/// Parse a comma-separated list of task types, skipping unknown entries.
fn parse_task_types(s: &str) -> Vec<TaskType> {
    let mut types = Vec::new();
    for part in s.split(',').filter(|p| !p.trim().is_empty()) {
        match part.parse::<TaskType>() {
            Ok(t) if !types.contains(&t) => types.push(t),
            Ok(_) => {}
            Err(e) => tracing::warn!("Ignoring VT_TASKS_ENABLED entry: {}", e),
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_types() {
        assert_eq!(
            parse_task_types("video/vod, video/live,video/vod,bogus"),
            vec![TaskType::Vod, TaskType::Live]
        );
        assert!(parse_task_types("").is_empty());
    }

    #[test]
    fn test_validate() {
        tokio_test::assert_ok!(WorkerConfig::default().validate());

        let config = WorkerConfig {
            manager_url: "http://localhost:7071/ws".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            api_endpoint: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
