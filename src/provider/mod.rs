//! Provider pool and failover.
//!
//! Provides the static provider registry and the health tracker that
//! switches the active provider when attempts keep exceeding the latency
//! threshold.

mod health;
mod latency;
mod registry;
mod selection;

pub use health::{
    AttemptKind, AttemptOutcome, FailoverEvent, HealthPolicy, HealthSnapshot, HealthTracker,
};
pub use latency::{FixedLatency, LatencySource, RandomLatency};
pub use registry::{Provider, ProviderError, ProviderRegistry};
pub use selection::{picker_for, RandomPicker, ResponsePicker, RoundRobinPicker};
