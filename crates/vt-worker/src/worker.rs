//! Broker consume loops and the status ticker.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};

use vt_models::{
    FailureMode, FullStatusIndicator, SyncMessage, TaskType, WorkerState, WorkerStatus,
};
use vt_queue::{Delivery, StatusPublisher, TaskBroker};

use crate::config::WorkerConfig;
use crate::error::{TaskError, WorkerResult};
use crate::logging::JobLogger;
use crate::reporter::StatusReporter;
use crate::task::{build_task, Task, TaskContext};
use crate::tasker::Tasker;

/// A worker node: one consume loop per enabled task type plus a status ticker.
pub struct Worker {
    config: WorkerConfig,
    worker_id: String,
    broker: Arc<dyn TaskBroker>,
    publisher: Arc<dyn StatusPublisher>,
    reporter: Arc<dyn StatusReporter>,
    tasker: Arc<Tasker>,
    ctx: Arc<TaskContext>,
    shutdown: watch::Sender<bool>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        worker_id: impl Into<String>,
        broker: Arc<dyn TaskBroker>,
        publisher: Arc<dyn StatusPublisher>,
        reporter: Arc<dyn StatusReporter>,
        ctx: Arc<TaskContext>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            worker_id: worker_id.into(),
            broker,
            publisher,
            reporter,
            tasker: Arc::new(Tasker::new()),
            ctx,
            shutdown,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn tasker(&self) -> &Arc<Tasker> {
        &self.tasker
    }

    /// Stop consuming and cancel running tasks.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run until [`Worker::shutdown`] is called.
    pub async fn run(self: Arc<Self>) -> WorkerResult<()> {
        info!(
            worker_id = %self.worker_id,
            "Starting worker for {:?}", self.config.tasks_enabled
        );

        let mut handles = Vec::new();
        for &task_type in &self.config.tasks_enabled {
            handles.push(tokio::spawn(Arc::clone(&self).consume_loop(task_type)));
        }
        handles.push(tokio::spawn(Arc::clone(&self).status_loop()));

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker loop ended abnormally: {}", e);
            }
        }

        info!(worker_id = %self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Prefetch 1: the next message is only read once this one is handled.
    async fn consume_loop(self: Arc<Self>, task_type: TaskType) {
        let consumer = format!("worker-{}", self.worker_id);
        let mut shutdown_rx = self.shutdown.subscribe();
        info!(task_type = %task_type, "Consuming tasks");

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = self.broker.receive(task_type, &consumer, self.config.receive_block) => {
                    match received {
                        Ok(Some(delivery)) => self.handle_delivery(delivery).await,
                        Ok(None) => {}
                        Err(e) => {
                            error!(task_type = %task_type, "Error receiving tasks: {}", e);
                            tokio::time::sleep(self.config.receive_error_backoff).await;
                        }
                    }
                }
            }
        }

        info!(task_type = %task_type, "Stopped consuming tasks");
    }

    /// Run one delivery to completion and acknowledge it whatever the outcome.
    pub async fn handle_delivery(&self, delivery: Delivery) {
        match build_task(delivery.task_type, &delivery.payload, Arc::clone(&self.ctx)) {
            Ok(task) => self.execute(task).await,
            Err(e) => warn!(
                task_type = %delivery.task_type,
                "Dropping message {}: {}", delivery.id, e
            ),
        }

        if let Err(e) = self.broker.ack(&delivery).await {
            error!("Failed to ack message {}: {}", delivery.id, e);
        }
    }

    async fn execute(&self, mut task: Box<dyn Task>) {
        let id = match task.id() {
            Some(id) => id,
            None => match task.validate_request() {
                Ok(id) => id,
                Err(e) => {
                    warn!(task_type = %task.task_type(), "Dropping invalid task: {}", e);
                    return;
                }
            },
        };
        let task: Arc<dyn Task> = Arc::from(task);
        let task_type = task.task_type();
        let logger = JobLogger::new(&id, task_type);

        logger.log_start(&format!("running on worker {}", self.worker_id));
        self.report(SyncMessage::worker(WorkerState::AddJob, &self.worker_id))
            .await;
        self.report(SyncMessage::Job(FullStatusIndicator::new(
            id.as_str(),
            FailureMode::InProgress,
            "Encoding",
            format!("{} task running on worker {}", task_type, self.worker_id),
        )))
        .await;

        let result = self
            .tasker
            .add(self.shutdown.subscribe(), task)
            .instrument(logger.create_span())
            .await;

        match result {
            Ok(()) => {
                logger.log_completion("encode finished");
                self.report(SyncMessage::Job(FullStatusIndicator::new(
                    id.as_str(),
                    FailureMode::CompletedOk,
                    "Completed",
                    format!("{} task finished", task_type),
                )))
                .await;
            }
            Err(TaskError::DuplicateJob(_)) => {
                logger.log_warning("already running on this worker, dropped");
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                self.report(SyncMessage::Job(FullStatusIndicator::new(
                    id.as_str(),
                    FailureMode::Failed,
                    if e.is_cancelled() { "Cancelled" } else { "Failed" },
                    e.to_string(),
                )))
                .await;
            }
        }

        self.report(SyncMessage::worker(WorkerState::EndJob, &self.worker_id))
            .await;
    }

    async fn report(&self, message: SyncMessage) {
        if let Err(e) = self.reporter.report(message).await {
            warn!(worker_id = %self.worker_id, "Failed to report to manager: {}", e);
        }
    }

    async fn status_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.status_interval);
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.publish_status().await {
                        warn!("Failed to publish worker status: {}", e);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Status of this worker and all of its running tasks, rebuilt on every call.
    pub fn snapshot(&self) -> WorkerStatus {
        WorkerStatus {
            worker_id: self.worker_id.clone(),
            tasks_enabled: self.config.tasks_enabled.clone(),
            current_tasks: self.tasker.statuses(),
        }
    }

    pub async fn publish_status(&self) -> WorkerResult<()> {
        self.publisher.publish_status(&self.snapshot()).await?;
        Ok(())
    }
}
