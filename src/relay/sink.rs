//! Durable-queue sink for inbound client messages.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use thiserror::Error;

use crate::config::SinkConfig;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to connect to message broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("Failed to open broker channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("Failed to declare queue '{queue}': {source}")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Failed to publish to queue '{queue}': {source}")]
    Publish {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// A message handed to the sink. Not retained after the publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl OutboundMessage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// Write-only sink that forwards messages downstream.
///
/// Implementations must tolerate concurrent `publish` calls from many sessions.
#[async_trait]
pub trait SinkPublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError>;
}

/// AMQP sink publishing to a queue through the default exchange.
pub struct AmqpSink {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpSink {
    /// Connect, open a channel and declare the queue.
    ///
    /// Declaration is idempotent: an existing queue with the same options is reused.
    pub async fn connect(config: &SinkConfig) -> Result<Self, SinkError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(SinkError::Connect)?;
        let channel = connection
            .create_channel()
            .await
            .map_err(SinkError::Channel)?;

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| SinkError::Declare {
                queue: config.queue.clone(),
                source,
            })?;

        tracing::info!(queue = %config.queue, "Sink queue declared");

        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
        })
    }

    pub async fn close(&self) {
        if let Err(err) = self.connection.close(200, "relay shutting down").await {
            tracing::warn!(error = %err, "Failed to close broker connection");
        }
    }
}

#[async_trait]
impl SinkPublisher for AmqpSink {
    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError> {
        let to_publish_error = |source: lapin::Error| SinkError::Publish {
            queue: self.queue.clone(),
            source,
        };

        let properties =
            BasicProperties::default().with_content_type(ShortString::from(message.content_type));

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &message.bytes,
                properties,
            )
            .await
            .map_err(to_publish_error)?
            .await
            .map_err(to_publish_error)?;

        Ok(())
    }
}
