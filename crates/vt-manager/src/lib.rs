//! Manager HTTP/WS server.
//!
//! This crate provides:
//! - Task submission endpoints publishing to the broker
//! - Job and worker status endpoints behind HTTP Basic auth
//! - The `/ws` status sync endpoint workers report into
//! - The in-memory state store and its tidier
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod ws;

pub use config::ManagerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{Tidier, TidierConfig};
pub use state::AppState;
pub use store::StateStore;
