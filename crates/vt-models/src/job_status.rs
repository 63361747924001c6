//! Manager-side job status records.
//!
//! A record starts out [`JobStatusRecord::Full`], is demoted to
//! [`JobStatusRecord::Short`] once its detail has aged out, and is finally
//! removed. It never moves back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Text returned in place of the detail once a record has been demoted.
pub const DETAIL_EXPIRED: &str = "Detailed Description Expired";

/// Outcome classification for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureMode {
    InProgress,
    CompletedOk,
    Failed,
}

impl FailureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::InProgress => "IN-PROGRESS",
            FailureMode::CompletedOk => "COMPLETED-OK",
            FailureMode::Failed => "FAILED",
        }
    }

    /// Parse a wire value. Anything unrecognised counts as a failure.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "IN-PROGRESS" => FailureMode::InProgress,
            "COMPLETED-OK" => FailureMode::CompletedOk,
            _ => FailureMode::Failed,
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FailureMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FailureMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FailureMode::parse_lenient(&s))
    }
}

/// Status record with the full detail text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullStatusIndicator {
    #[serde(rename = "jobID")]
    pub job_id: String,
    #[serde(rename = "failureMode")]
    pub failure_mode: FailureMode,
    pub summary: String,
    pub detail: String,
    pub time: DateTime<Utc>,
}

impl FullStatusIndicator {
    pub fn new(
        job_id: impl Into<String>,
        failure_mode: FailureMode,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            failure_mode,
            summary: summary.into(),
            detail: detail.into(),
            time: Utc::now(),
        }
    }

    /// Drop the detail, keeping identity, outcome, summary and time.
    pub fn demote(&self, now: DateTime<Utc>) -> ShortStatusIndicator {
        ShortStatusIndicator {
            job_id: self.job_id.clone(),
            failure_mode: self.failure_mode,
            summary: self.summary.clone(),
            time: self.time,
            full_expired_time: now,
        }
    }
}

/// Status record whose detail has expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortStatusIndicator {
    #[serde(rename = "jobID")]
    pub job_id: String,
    #[serde(rename = "failureMode")]
    pub failure_mode: FailureMode,
    pub summary: String,
    pub time: DateTime<Utc>,
    #[serde(rename = "fullExpiredTime")]
    pub full_expired_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobStatusRecord {
    Full(FullStatusIndicator),
    Short(ShortStatusIndicator),
}

impl JobStatusRecord {
    pub fn job_id(&self) -> &str {
        match self {
            JobStatusRecord::Full(s) => &s.job_id,
            JobStatusRecord::Short(s) => &s.job_id,
        }
    }

    pub fn failure_mode(&self) -> FailureMode {
        match self {
            JobStatusRecord::Full(s) => s.failure_mode,
            JobStatusRecord::Short(s) => s.failure_mode,
        }
    }

    /// True when the job failed.
    pub fn failure(&self) -> bool {
        self.failure_mode() == FailureMode::Failed
    }

    pub fn summary(&self) -> &str {
        match self {
            JobStatusRecord::Full(s) => &s.summary,
            JobStatusRecord::Short(s) => &s.summary,
        }
    }

    pub fn detailed_status(&self) -> &str {
        match self {
            JobStatusRecord::Full(s) => &s.detail,
            JobStatusRecord::Short(_) => DETAIL_EXPIRED,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            JobStatusRecord::Full(s) => s.time,
            JobStatusRecord::Short(s) => s.time,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, JobStatusRecord::Full(_))
    }
}
