//! Worker/manager status sync envelope.
//!
//! Every frame on the sync channel is a JSON object
//! `{"header": "WORKER" | "JOB", "body": ...}`.

use serde::{Deserialize, Serialize};

use crate::job_status::FullStatusIndicator;

/// Worker lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    #[serde(rename = "START")]
    Start,
    #[serde(rename = "END")]
    End,
    #[serde(rename = "ADD JOB")]
    AddJob,
    #[serde(rename = "END JOB")]
    EndJob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatusUpdate {
    pub state: WorkerState,
    #[serde(rename = "workerID")]
    pub worker_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "header", content = "body")]
pub enum SyncMessage {
    #[serde(rename = "WORKER")]
    Worker(WorkerStatusUpdate),
    #[serde(rename = "JOB")]
    Job(FullStatusIndicator),
}

impl SyncMessage {
    pub fn worker(state: WorkerState, worker_id: impl Into<String>) -> Self {
        SyncMessage::Worker(WorkerStatusUpdate {
            state,
            worker_id: worker_id.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_status::FailureMode;

    #[test]
    fn test_worker_envelope_shape() {
        let msg = SyncMessage::worker(WorkerState::AddJob, "w-1");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["header"], "WORKER");
        assert_eq!(json["body"]["state"], "ADD JOB");
        assert_eq!(json["body"]["workerID"], "w-1");
    }

    #[test]
    fn test_job_envelope_parses() {
        let raw = r#"{
            "header": "JOB",
            "body": {
                "jobID": "j-1",
                "failureMode": "FAILED",
                "summary": "Encode failed",
                "detail": "exit status 1",
                "time": "2024-01-01T00:00:00Z"
            }
        }"#;
        let msg: SyncMessage = serde_json::from_str(raw).unwrap();
        match msg {
            SyncMessage::Job(status) => {
                assert_eq!(status.job_id, "j-1");
                assert_eq!(status.failure_mode, FailureMode::Failed);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_header_rejected() {
        let raw = r#"{"header":"PING","body":{}}"#;
        assert!(serde_json::from_str::<SyncMessage>(raw).is_err());
    }
}
