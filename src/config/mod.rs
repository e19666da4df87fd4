//! Relay configuration: TOML file with serde defaults, validated on load.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, HealthConfig, ProviderConfig, SelectionMode, ServerConfig, SinkConfig};
