use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use text_relay::cli::Cli;
use text_relay::logging::init_tracing;
use text_relay::relay::AmqpSink;
use text_relay::server::RelayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.load_config().context("Failed to load configuration")?;

    // The relay does not start without a working sink.
    let sink = Arc::new(AmqpSink::connect(&config.sink).await?);

    let mut server = RelayServer::new(config, sink.clone())?;
    server.try_bind().await?;
    server.run().await?;

    sink.close().await;
    Ok(())
}
