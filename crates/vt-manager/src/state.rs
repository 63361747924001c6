//! Application state.

use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use vt_queue::TaskBroker;

use crate::config::ManagerConfig;
use crate::store::StateStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ManagerConfig,
    pub store: Arc<StateStore>,
    pub broker: Arc<dyn TaskBroker>,
    /// Open `/ws` connections
    pub sync_connections: Arc<AtomicI64>,
}

impl AppState {
    pub fn new(config: ManagerConfig, store: Arc<StateStore>, broker: Arc<dyn TaskBroker>) -> Self {
        Self {
            config,
            store,
            broker,
            sync_connections: Arc::new(AtomicI64::new(0)),
        }
    }
}
