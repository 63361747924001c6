//! Manager-side worker records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    #[serde(rename = "workerID")]
    pub worker_id: String,
    #[serde(rename = "jobsCount")]
    pub jobs_count: u32,
}

impl WorkerRecord {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            jobs_count: 0,
        }
    }

    pub fn busy(&self) -> bool {
        self.jobs_count != 0
    }

    pub fn start_job(&mut self) {
        self.jobs_count = self.jobs_count.saturating_add(1);
    }

    /// Never goes below zero.
    pub fn end_job(&mut self) {
        self.jobs_count = self.jobs_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_counting() {
        let mut w = WorkerRecord::new("w1");
        assert!(!w.busy());
        w.start_job();
        w.start_job();
        w.end_job();
        assert_eq!(w.jobs_count, 1);
        assert!(w.busy());
        w.end_job();
        w.end_job();
        assert_eq!(w.jobs_count, 0);
        assert!(!w.busy());
    }
}
