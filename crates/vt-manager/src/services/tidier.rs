//! Background service that ages out job status records.
//!
//! Every interval it:
//! - Demotes full records past the short expiry, dropping their detail
//! - Deletes short records past the long expiry

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::metrics;
use crate::store::{StateStore, TidyOutcome};

/// Tidier timings.
#[derive(Debug, Clone)]
pub struct TidierConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Age at which a full record loses its detail
    pub short_expiry: Duration,
    /// Age at which a short record is deleted
    pub long_expiry: Duration,
}

impl Default for TidierConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            short_expiry: Duration::from_secs(2 * 24 * 60 * 60),
            long_expiry: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl TidierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            interval: secs("VT_TIDY_INTERVAL_SECS", defaults.interval),
            short_expiry: secs("VT_SHORT_EXPIRY_SECS", defaults.short_expiry),
            long_expiry: secs("VT_LONG_EXPIRY_SECS", defaults.long_expiry),
        }
    }
}

/// Periodic sweeper over the job map.
pub struct Tidier {
    store: Arc<StateStore>,
    config: TidierConfig,
}

impl Tidier {
    pub fn new(store: Arc<StateStore>, config: TidierConfig) -> Self {
        Self { store, config }
    }

    /// Sweep on every tick until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting tidier (interval: {:?})", self.config.interval);

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Tidier stopped");
    }

    /// Run a single sweep at the current time.
    pub async fn check_once(&self) -> TidyOutcome {
        self.tidy(Utc::now()).await
    }

    /// Run a single sweep as of `now`.
    pub async fn tidy(&self, now: DateTime<Utc>) -> TidyOutcome {
        let outcome = self
            .store
            .tidy(
                now,
                to_delta(self.config.short_expiry),
                to_delta(self.config.long_expiry),
            )
            .await;

        metrics::record_tidy(outcome.demoted, outcome.deleted, self.store.jobs_len().await);
        if outcome.demoted > 0 || outcome.deleted > 0 {
            info!(
                demoted = outcome.demoted,
                deleted = outcome.deleted,
                "Tidied job statuses"
            );
        } else {
            debug!("Nothing to tidy");
        }

        outcome
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
