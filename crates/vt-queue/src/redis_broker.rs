//! Redis-backed broker.
//!
//! Each routing key maps to its own stream (`{prefix}:{task type}`), read
//! through a shared consumer group so each message reaches one worker.
//! Worker status goes out on a Pub/Sub channel.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vt_models::{TaskType, WorkerStatus};

use crate::broker::{Delivery, StatusPublisher, TaskBroker};
use crate::error::{QueueError, QueueResult};

const PAYLOAD_FIELD: &str = "task";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Prefix for per-type task streams
    pub stream_prefix: String,
    /// Consumer group shared by all workers
    pub consumer_group: String,
    /// Pub/Sub channel for worker status
    pub status_channel: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_prefix: "encode".to_string(),
            consumer_group: "encode-workers".to_string(),
            status_channel: "encode-status".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("VT_REDIS_URL").unwrap_or(defaults.redis_url),
            stream_prefix: std::env::var("VT_QUEUE_PREFIX").unwrap_or(defaults.stream_prefix),
            consumer_group: std::env::var("VT_QUEUE_GROUP").unwrap_or(defaults.consumer_group),
            status_channel: std::env::var("VT_STATUS_CHANNEL").unwrap_or(defaults.status_channel),
        }
    }

    pub fn stream_name(&self, task_type: TaskType) -> String {
        format!("{}:{}", self.stream_prefix, task_type)
    }
}

/// Broker client backed by Redis Streams and Pub/Sub.
pub struct RedisBroker {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisBroker {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Check connectivity and create consumer groups for the given types.
    pub async fn init(&self, task_types: &[TaskType]) -> QueueResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;

        for &task_type in task_types {
            let stream = self.config.stream_name(task_type);
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&stream)
                .arg(&self.config.consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!("Created consumer group {} on {}", self.config.consumer_group, stream),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!("Consumer group already exists on {}", stream);
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn publish(&self, task_type: TaskType, payload: &[u8]) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(task_type);

        let message_id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!("Published task to {} with message ID {}", stream, message_id);
        Ok(message_id)
    }

    async fn receive(
        &self,
        task_type: TaskType,
        consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(task_type);

        let reply: Option<redis::streams::StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let Some(entry) = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next()
        else {
            return Ok(None);
        };

        let delivery = match entry.map.get(PAYLOAD_FIELD) {
            Some(redis::Value::BulkString(payload)) => Delivery {
                id: entry.id.clone(),
                task_type,
                payload: payload.clone(),
            },
            _ => {
                warn!("Message {} on {} has no payload, dropping", entry.id, stream);
                Delivery {
                    id: entry.id.clone(),
                    task_type,
                    payload: Vec::new(),
                }
            }
        };

        Ok(Some(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(delivery.task_type);

        redis::cmd("XACK")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg(&delivery.id)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&stream)
            .arg(&delivery.id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message {} on {}", delivery.id, stream);
        Ok(())
    }
}

#[async_trait]
impl StatusPublisher for RedisBroker {
    async fn publish_status(&self, status: &WorkerStatus) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(status)?;

        conn.publish::<_, _, ()>(&self.config.status_channel, payload)
            .await?;
        Ok(())
    }
}
