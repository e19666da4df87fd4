//! Latency generators for provider attempts.
//!
//! The tracker never measures wall-clock time itself: it asks a
//! [`LatencySource`] for the latency of the next attempt and suspends for
//! that long. Tests plug in deterministic sources.

use std::time::Duration;

use rand::Rng;

/// Produces the latency of the next provider attempt.
pub trait LatencySource: Send + Sync {
    fn next_latency(&self) -> Duration;
}

/// Uniformly random latency in `[0, max)`, millisecond granularity.
#[derive(Debug, Clone)]
pub struct RandomLatency {
    max_ms: u64,
}

impl RandomLatency {
    pub fn new(max: Duration) -> Self {
        Self {
            max_ms: (max.as_millis() as u64).max(1),
        }
    }
}

impl LatencySource for RandomLatency {
    fn next_latency(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(0..self.max_ms))
    }
}

/// Always the same latency.
#[derive(Debug, Clone, Copy)]
pub struct FixedLatency(pub Duration);

impl LatencySource for FixedLatency {
    fn next_latency(&self) -> Duration {
        self.0
    }
}
