//! Periodic health driver.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::ChannelManager;

/// Default tick (1 second).
const DEFAULT_TICK_SECS: u64 = 1;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often due work is looked for. Per-channel health intervals are
    /// enforced on top of this.
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(DEFAULT_TICK_SECS),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub health_checks: usize,
    pub health_failures: usize,
    pub reconnected: usize,
    pub previews_cancelled: usize,
}

/// Drives health checks, deferred reconnects and preview timeouts on a
/// shared manager.
pub struct HealthScheduler {
    manager: Arc<Mutex<ChannelManager>>,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
}

impl HealthScheduler {
    pub fn new(
        manager: Arc<Mutex<ChannelManager>>,
        config: SchedulerConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            manager,
            config,
            cancellation_token,
        }
    }

    /// Run until the cancellation token fires.
    pub async fn run(&self) {
        info!(tick_ms = self.config.tick.as_millis() as u64, "Starting health scheduler");

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("Health scheduler received cancellation signal");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.tick_once(Utc::now()).await;
                    if summary != TickSummary::default() {
                        debug!(?summary, "Scheduler tick");
                    }
                }
            }
        }
    }

    /// Do whatever is due at `now`.
    pub async fn tick_once(&self, now: DateTime<Utc>) -> TickSummary {
        let mut manager = self.manager.lock().await;

        let previews = manager.cancel_timed_out_previews(now).await;
        let reconnected = manager.complete_due_reconnects(now).await;
        let checks = manager.run_due_health_checks(now).await;
        if !checks.is_success() {
            warn!(failed = checks.failed.len(), "Some health checks failed");
        }

        TickSummary {
            health_checks: checks.succeeded.len() + checks.failed.len(),
            health_failures: checks.failed.len(),
            reconnected,
            previews_cancelled: previews.len(),
        }
    }
}
