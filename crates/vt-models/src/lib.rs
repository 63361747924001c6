//! Shared data models for the vt transcode system.
//!
//! This crate provides Serde-serializable types for:
//! - Task submissions and routing tags
//! - Progress stats and per-task status snapshots
//! - Manager-side job status records and worker records
//! - The worker/manager status sync envelope

pub mod error;
pub mod job_status;
pub mod status;
pub mod sync;
pub mod task;
pub mod worker;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job_status::{
    FailureMode, FullStatusIndicator, JobStatusRecord, ShortStatusIndicator, DETAIL_EXPIRED,
};
pub use status::{Stage, Stats, Status, WorkerStatus, INDETERMINATE_DURATION};
pub use sync::{SyncMessage, WorkerState, WorkerStatusUpdate};
pub use task::{TaskId, TaskIdentification, TaskRequest, TaskType};
pub use worker::WorkerRecord;
