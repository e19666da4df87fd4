use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, ConfigError};

#[derive(Parser, Debug, Default)]
#[command(name = "text-relay", about = "Websocket text relay with provider failover")]
pub struct Cli {
    /// Config file (default: ~/.config/text-relay/config.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub bind: Option<String>,

    /// AMQP broker URI
    #[arg(long)]
    pub amqp_url: Option<String>,

    /// Queue inbound messages are published to
    #[arg(long)]
    pub queue: Option<String>,
}

impl Cli {
    /// Load the config file and apply command-line overrides on top.
    ///
    /// An explicit `--config` path must exist; the default path may be absent.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) if !path.exists() => {
                return Err(ConfigError::ReadError {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind_addr = bind.clone();
        }
        if let Some(url) = &self.amqp_url {
            config.sink.url = url.clone();
        }
        if let Some(queue) = &self.queue {
            config.sink.queue = queue.clone();
        }
    }
}
