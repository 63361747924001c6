//! Broker seams.

use std::time::Duration;

use async_trait::async_trait;
use vt_models::{TaskRequest, TaskType, WorkerStatus};

use crate::error::QueueResult;

/// A task message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message ID, used for acknowledgement
    pub id: String,
    /// Routing key the message arrived on
    pub task_type: TaskType,
    pub payload: Vec<u8>,
}

/// Routes task messages by type to competing consumers.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Publish a raw payload under a routing key. Returns the message ID.
    async fn publish(&self, task_type: TaskType, payload: &[u8]) -> QueueResult<String>;

    /// Wait up to `block` for the next message of `task_type`.
    ///
    /// At most one unacknowledged delivery is handed out per call.
    async fn receive(
        &self,
        task_type: TaskType,
        consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<Delivery>>;

    /// Acknowledge a delivery. It will not be handed out again.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Serialize and publish a task request.
    async fn publish_task(&self, task_type: TaskType, request: &TaskRequest) -> QueueResult<String> {
        let payload = serde_json::to_vec(request)?;
        self.publish(task_type, &payload).await
    }
}

/// Fan-out of periodic worker status.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish_status(&self, status: &WorkerStatus) -> QueueResult<()>;
}
