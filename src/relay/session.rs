//! Per-connection relay loop.
//!
//! `Connected → Reading → (Publishing → Responding → Reading)* → Closed`.
//! Messages on one connection are handled strictly in arrival order; a read
//! or send failure closes only this session.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::provider::HealthTracker;
use crate::relay::channel::{ChannelError, MessageChannel};
use crate::relay::connections::{ConnectionId, ConnectionInfo, ConnectionRegistry};
use crate::relay::sink::{OutboundMessage, SinkPublisher};

/// Why a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client closed the channel.
    ClientClosed,
    ReadFailed(ChannelError),
    SendFailed(ChannelError),
}

/// Everything a session needs; cloned into each connection task.
#[derive(Clone)]
pub struct RelaySession {
    tracker: HealthTracker,
    sink: Arc<dyn SinkPublisher>,
    connections: ConnectionRegistry,
    content_type: String,
}

impl RelaySession {
    pub fn new(
        tracker: HealthTracker,
        sink: Arc<dyn SinkPublisher>,
        connections: ConnectionRegistry,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            sink,
            connections,
            content_type: content_type.into(),
        }
    }

    /// Serve one client until it disconnects or the channel fails.
    pub async fn run<C: MessageChannel>(&self, mut channel: C, peer: Option<SocketAddr>) -> SessionEnd {
        let id = ConnectionId::new();
        let (notice_tx, mut notices) = mpsc::unbounded_channel();
        let _registration = self.connections.add(ConnectionInfo::new(id, peer), notice_tx);

        tracing::info!(connection_id = %id, peer = ?peer, "Client connected");

        let end = loop {
            tokio::select! {
                inbound = channel.receive() => match inbound {
                    Ok(Some(bytes)) => {
                        if let Err(err) = self.handle_message(&mut channel, id, bytes).await {
                            break SessionEnd::SendFailed(err);
                        }
                    }
                    Ok(None) => break SessionEnd::ClientClosed,
                    Err(err) => break SessionEnd::ReadFailed(err),
                },
                Some(notice) = notices.recv() => {
                    if let Err(err) = channel.send(notice).await {
                        break SessionEnd::SendFailed(err);
                    }
                }
            }
        };

        match &end {
            SessionEnd::ClientClosed => {
                tracing::info!(connection_id = %id, "Client disconnected");
            }
            SessionEnd::ReadFailed(err) | SessionEnd::SendFailed(err) => {
                tracing::warn!(connection_id = %id, error = %err, "Connection closed");
            }
        }

        end
    }

    async fn handle_message<C: MessageChannel>(
        &self,
        channel: &mut C,
        id: ConnectionId,
        bytes: Vec<u8>,
    ) -> Result<(), ChannelError> {
        tracing::debug!(
            connection_id = %id,
            message = %String::from_utf8_lossy(&bytes),
            "Received message"
        );

        // Delivery to the sink is best-effort and never gates the reply.
        let message = OutboundMessage::new(bytes, self.content_type.as_str());
        if let Err(err) = self.sink.publish(message).await {
            tracing::warn!(connection_id = %id, error = %err, "Failed to publish message");
        }

        let outcome = self.tracker.record_attempt().await;
        tracing::debug!(
            connection_id = %id,
            provider_id = outcome.provider_id,
            kind = ?outcome.kind,
            latency_ms = outcome.latency.as_millis() as u64,
            "Provider attempt finished"
        );

        channel.send(outcome.text).await
    }
}
