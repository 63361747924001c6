//! In-process broker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, Notify};

use vt_models::{TaskType, WorkerStatus};

use crate::broker::{Delivery, StatusPublisher, TaskBroker};
use crate::error::QueueResult;

/// Broker keeping queues in memory, with the same delivery rules as Redis:
/// one consumer per message, messages stay unacknowledged until `ack`.
pub struct MemoryBroker {
    queues: Mutex<HashMap<TaskType, VecDeque<Delivery>>>,
    unacked: Mutex<HashSet<String>>,
    notify: Notify,
    next_id: AtomicU64,
    status_tx: broadcast::Sender<WorkerStatus>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            queues: Mutex::new(HashMap::new()),
            unacked: Mutex::new(HashSet::new()),
            notify: Notify::new(),
            next_id: AtomicU64::new(1),
            status_tx,
        }
    }

    /// Messages waiting on a routing key, oldest first.
    pub async fn queued(&self, task_type: TaskType) -> Vec<Delivery> {
        self.queues
            .lock()
            .await
            .get(&task_type)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of handed-out deliveries not yet acknowledged.
    pub async fn unacked_count(&self) -> usize {
        self.unacked.lock().await.len()
    }

    /// Receive worker status published after this call.
    pub fn subscribe_status(&self) -> broadcast::Receiver<WorkerStatus> {
        self.status_tx.subscribe()
    }

    async fn pop(&self, task_type: TaskType) -> Option<Delivery> {
        let delivery = self.queues.lock().await.get_mut(&task_type)?.pop_front()?;
        self.unacked.lock().await.insert(delivery.id.clone());
        Some(delivery)
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    async fn publish(&self, task_type: TaskType, payload: &[u8]) -> QueueResult<String> {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.queues
            .lock()
            .await
            .entry(task_type)
            .or_default()
            .push_back(Delivery {
                id: id.clone(),
                task_type,
                payload: payload.to_vec(),
            });
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn receive(
        &self,
        task_type: TaskType,
        _consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<Delivery>> {
        let deadline = tokio::time::Instant::now() + block;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.pop(task_type).await {
                return Ok(Some(delivery));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.unacked.lock().await.remove(&delivery.id);
        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for MemoryBroker {
    async fn publish_status(&self, status: &WorkerStatus) -> QueueResult<()> {
        // No subscribers is fine for a fan-out
        let _ = self.status_tx.send(status.clone());
        Ok(())
    }
}
