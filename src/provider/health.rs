//! Provider health tracking and failover.
//!
//! One mutex-guarded [`HealthState`] holds the active provider index and the
//! rolling error count. Every state transition happens inside a single
//! critical section, so concurrent relay sessions never lose an increment
//! and each crossing of the error threshold switches providers exactly once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::config::Config;
use crate::provider::latency::{LatencySource, RandomLatency};
use crate::provider::registry::{ProviderError, ProviderRegistry};
use crate::provider::selection::{picker_for, ResponsePicker};

const FAILOVER_LOG_CAPACITY: usize = 100;

/// Thresholds that decide when an attempt is an error and when to fail over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub error_threshold: u32,
    pub latency_threshold: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            error_threshold: 3,
            latency_threshold: Duration::from_millis(2000),
        }
    }
}

impl From<&crate::config::HealthConfig> for HealthPolicy {
    fn from(config: &crate::config::HealthConfig) -> Self {
        Self {
            // A zero threshold would fail over on every slow attempt before counting it.
            error_threshold: config.error_threshold.max(1),
            latency_threshold: config.latency_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// The provider answered within the latency threshold.
    Response,
    /// The attempt was too slow but the error threshold was not reached.
    Error,
    /// The attempt pushed the error count to the threshold and the active provider changed.
    Failover,
}

/// Result of one [`HealthTracker::record_attempt`] call, ready to send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub kind: AttemptKind,
    pub text: String,
    /// For `Failover`, the newly active provider; otherwise the provider attempted.
    pub provider_id: u32,
    pub switched: bool,
    pub latency: Duration,
}

/// Point-in-time copy of the tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub active_index: usize,
    pub active_provider_id: u32,
    pub error_count: u32,
    pub failovers: u64,
}

/// Log entry for a failover.
#[derive(Debug, Clone)]
pub struct FailoverEvent {
    pub at: SystemTime,
    pub from_provider: u32,
    pub to_provider: u32,
}

struct HealthState {
    active_index: usize,
    error_count: u32,
    failovers: u64,
    failover_log: VecDeque<FailoverEvent>,
}

struct TrackerInner {
    registry: Arc<ProviderRegistry>,
    policy: HealthPolicy,
    latency: Box<dyn LatencySource>,
    picker: Box<dyn ResponsePicker>,
    state: Mutex<HealthState>,
}

/// Shared handle to the provider health state. Cloning is cheap.
#[derive(Clone)]
pub struct HealthTracker {
    inner: Arc<TrackerInner>,
}

impl HealthTracker {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        policy: HealthPolicy,
        latency: Box<dyn LatencySource>,
        picker: Box<dyn ResponsePicker>,
    ) -> Self {
        let state = HealthState {
            active_index: 0,
            error_count: 0,
            failovers: 0,
            failover_log: VecDeque::new(),
        };

        Self {
            inner: Arc::new(TrackerInner {
                registry,
                policy,
                latency,
                picker,
                state: Mutex::new(state),
            }),
        }
    }

    /// Build a tracker with random latency and the configured selection mode.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let registry = Arc::new(ProviderRegistry::from_config(&config.providers)?);
        Ok(Self::new(
            registry,
            HealthPolicy::from(&config.health),
            Box::new(RandomLatency::new(config.health.max_simulated_latency())),
            picker_for(config.health.selection),
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn policy(&self) -> HealthPolicy {
        self.inner.policy
    }

    /// Run one attempt against the active provider and apply the health policy.
    ///
    /// The simulated latency is awaited outside the lock; only the state
    /// transition that follows is serialized with other callers. A slow attempt
    /// that started before a failover counts against the provider active when it
    /// finishes.
    pub async fn record_attempt(&self) -> AttemptOutcome {
        let attempted_index = self.inner.state.lock().active_index;
        let latency = self.inner.latency.next_latency();
        tokio::time::sleep(latency).await;

        match self.apply_attempt(attempted_index, latency) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "Provider lookup failed");
                AttemptOutcome {
                    kind: AttemptKind::Error,
                    text: format!("Provider unavailable: {}", err),
                    provider_id: 0,
                    switched: false,
                    latency,
                }
            }
        }
    }

    fn apply_attempt(
        &self,
        attempted_index: usize,
        latency: Duration,
    ) -> Result<AttemptOutcome, ProviderError> {
        let registry = &self.inner.registry;
        let attempted = registry.get(attempted_index)?;

        if latency <= self.inner.policy.latency_threshold {
            let responses = attempted.responses();
            let text = responses[self.inner.picker.pick(responses.len()) % responses.len()].clone();
            return Ok(AttemptOutcome {
                kind: AttemptKind::Response,
                text,
                provider_id: attempted.id(),
                switched: false,
                latency,
            });
        }

        let mut state = self.inner.state.lock();
        state.error_count += 1;

        if state.error_count < self.inner.policy.error_threshold {
            tracing::debug!(
                provider_id = attempted.id(),
                latency_ms = latency.as_millis() as u64,
                error_count = state.error_count,
                "Provider response time exceeded"
            );
            return Ok(AttemptOutcome {
                kind: AttemptKind::Error,
                text: format!("Provider {} error: response time exceeded", attempted.id()),
                provider_id: attempted.id(),
                switched: false,
                latency,
            });
        }

        let from = registry.get(state.active_index)?.id();
        let next_index = (state.active_index + 1) % registry.count();
        let to = registry.get(next_index)?.id();

        state.active_index = next_index;
        state.error_count = 0;
        state.failovers += 1;
        if state.failover_log.len() == FAILOVER_LOG_CAPACITY {
            state.failover_log.pop_front();
        }
        state.failover_log.push_back(FailoverEvent {
            at: SystemTime::now(),
            from_provider: from,
            to_provider: to,
        });

        tracing::warn!(
            from_provider = from,
            to_provider = to,
            latency_ms = latency.as_millis() as u64,
            "Provider failover"
        );

        Ok(AttemptOutcome {
            kind: AttemptKind::Failover,
            text: format!("Switched to Provider {} due to errors", to),
            provider_id: to,
            switched: true,
            latency,
        })
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.inner.state.lock();
        let active_provider_id = self
            .inner
            .registry
            .get(state.active_index)
            .map(|p| p.id())
            .unwrap_or_default();
        HealthSnapshot {
            active_index: state.active_index,
            active_provider_id,
            error_count: state.error_count,
            failovers: state.failovers,
        }
    }

    /// Recent failovers, oldest first.
    pub fn failover_log(&self) -> Vec<FailoverEvent> {
        self.inner.state.lock().failover_log.iter().cloned().collect()
    }
}
