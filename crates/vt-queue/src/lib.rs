//! Task routing and status fan-out.
//!
//! This crate provides:
//! - The `TaskBroker` and `StatusPublisher` seams used by the manager and workers
//! - A Redis implementation (Streams per task type, Pub/Sub for status)
//! - An in-process implementation for tests and single-node runs

pub mod broker;
pub mod error;
pub mod memory;
pub mod redis_broker;

pub use broker::{Delivery, StatusPublisher, TaskBroker};
pub use error::{QueueError, QueueResult};
pub use memory::MemoryBroker;
pub use redis_broker::{QueueConfig, RedisBroker};
