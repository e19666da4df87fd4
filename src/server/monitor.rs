//! Periodic provider monitor.
//!
//! Only logs the current provider state for now; it is the hook where active
//! health probes would run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::provider::HealthTracker;
use crate::server::shutdown::ShutdownManager;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct ProviderMonitor {
    tracker: HealthTracker,
    interval: Duration,
    ticks: Arc<AtomicU64>,
}

impl ProviderMonitor {
    /// Intervals below one second are raised to one second.
    pub fn new(tracker: HealthTracker, interval: Duration) -> Self {
        Self {
            tracker,
            interval: interval.max(MIN_INTERVAL),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of completed ticks.
    pub fn tick_counter(&self) -> Arc<AtomicU64> {
        self.ticks.clone()
    }

    /// Runs until shutdown is signaled.
    pub fn spawn(self, shutdown: Arc<ShutdownManager>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(self, shutdown: Arc<ShutdownManager>) {
        // First tick fires one full interval after start.
        let start = tokio::time::Instant::now() + self.interval;
        let mut interval = tokio::time::interval_at(start, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                _ = shutdown.wait() => break,
            }
        }

        tracing::debug!("Provider monitor stopped");
    }

    fn tick(&self) {
        let snapshot = self.tracker.snapshot();
        self.ticks.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            active_provider = snapshot.active_provider_id,
            error_count = snapshot.error_count,
            failovers = snapshot.failovers,
            "Monitoring providers"
        );
    }
}
