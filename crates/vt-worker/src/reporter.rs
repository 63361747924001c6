//! Outbound job and worker lifecycle announcements.

use async_trait::async_trait;

use vt_models::SyncMessage;

use crate::error::WorkerResult;

/// Where the worker sends lifecycle updates for the manager.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, message: SyncMessage) -> WorkerResult<()>;
}
