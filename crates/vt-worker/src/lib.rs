//! Transcode worker.
//!
//! This crate provides:
//! - Task variants (simple video, VOD, live) behind the `Task` trait
//! - The `Tasker` registry of running tasks
//! - Broker consume loops and the periodic status ticker
//! - The WebSocket client announcing worker and job lifecycle to the manager

pub mod config;
pub mod error;
pub mod logging;
pub mod reporter;
pub mod sync_client;
pub mod task;
pub mod tasker;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{TaskError, TaskResult, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use reporter::StatusReporter;
pub use sync_client::SyncClient;
pub use task::{build_task, Task, TaskContext};
pub use tasker::Tasker;
pub use worker::Worker;
