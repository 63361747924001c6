//! In-memory job and worker state.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use vt_models::{
    FailureMode, FullStatusIndicator, JobStatusRecord, SyncMessage, WorkerRecord, WorkerState,
    WorkerStatusUpdate,
};

/// Records removed or shortened by one tidy sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidyOutcome {
    pub demoted: usize,
    pub deleted: usize,
}

/// Job status and connected workers, as reported over the sync channel.
#[derive(Default)]
pub struct StateStore {
    jobs: RwLock<HashMap<String, JobStatusRecord>>,
    workers: RwLock<HashMap<String, WorkerRecord>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one sync message to the map it updates.
    pub async fn apply(&self, message: SyncMessage) {
        match message {
            SyncMessage::Worker(update) => self.apply_worker(update).await,
            SyncMessage::Job(status) => self.upsert_job(status).await,
        }
    }

    async fn apply_worker(&self, update: WorkerStatusUpdate) {
        let mut workers = self.workers.write().await;
        let id = update.worker_id;

        match update.state {
            WorkerState::Start => {
                info!(worker_id = %id, "Worker connected");
                workers.insert(id.clone(), WorkerRecord::new(id));
            }
            WorkerState::End => {
                if workers.remove(&id).is_some() {
                    info!(worker_id = %id, "Worker disconnected");
                }
            }
            WorkerState::AddJob => match workers.get_mut(&id) {
                Some(worker) => worker.start_job(),
                None => warn!(worker_id = %id, "Job started on unknown worker"),
            },
            WorkerState::EndJob => match workers.get_mut(&id) {
                Some(worker) => worker.end_job(),
                None => warn!(worker_id = %id, "Job ended on unknown worker"),
            },
        }
    }

    /// Store a full record, stamped with the time it arrived here.
    pub async fn upsert_job(&self, mut status: FullStatusIndicator) {
        status.time = Utc::now();
        debug!(
            job_id = %status.job_id,
            failure_mode = %status.failure_mode.as_str(),
            "Job status updated"
        );
        self.jobs
            .write()
            .await
            .insert(status.job_id.clone(), JobStatusRecord::Full(status));
    }

    /// Record a freshly submitted job as in progress.
    pub async fn submit_job(&self, job_id: &str, detail: impl Into<String>) {
        self.upsert_job(FullStatusIndicator::new(
            job_id,
            FailureMode::InProgress,
            "Starting",
            detail,
        ))
        .await;
    }

    /// Forget a job record. Returns whether one was present.
    pub async fn remove_job(&self, job_id: &str) -> bool {
        self.jobs.write().await.remove(job_id).is_some()
    }

    pub async fn job(&self, job_id: &str) -> Option<JobStatusRecord> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn jobs_len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn workers(&self) -> HashMap<String, WorkerRecord> {
        self.workers.read().await.clone()
    }

    pub async fn worker(&self, worker_id: &str) -> Option<WorkerRecord> {
        self.workers.read().await.get(worker_id).cloned()
    }

    /// Drop workers whose connection went away without an `END`.
    pub async fn remove_workers<'a>(&self, worker_ids: impl IntoIterator<Item = &'a String>) -> usize {
        let mut workers = self.workers.write().await;
        let mut removed = 0;
        for id in worker_ids {
            if workers.remove(id).is_some() {
                warn!(worker_id = %id, "Worker dropped without announcing END");
                removed += 1;
            }
        }
        removed
    }

    /// Demote full records older than `short_expiry` and delete short
    /// records older than `long_expiry`, measured from their own `time`.
    pub async fn tidy(
        &self,
        now: DateTime<Utc>,
        short_expiry: TimeDelta,
        long_expiry: TimeDelta,
    ) -> TidyOutcome {
        let mut jobs = self.jobs.write().await;
        let mut outcome = TidyOutcome::default();

        jobs.retain(|_, record| match record {
            JobStatusRecord::Short(short) => {
                let keep = now - short.time <= long_expiry;
                if !keep {
                    outcome.deleted += 1;
                }
                keep
            }
            JobStatusRecord::Full(_) => true,
        });

        for record in jobs.values_mut() {
            if let JobStatusRecord::Full(full) = record {
                if now - full.time > short_expiry {
                    *record = JobStatusRecord::Short(full.demote(now));
                    outcome.demoted += 1;
                }
            }
        }

        outcome
    }
}
