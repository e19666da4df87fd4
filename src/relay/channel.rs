//! Transport boundary for a relay session.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Read error: {0}")]
    Receive(String),

    #[error("Send error: {0}")]
    Send(String),
}

/// A persistent bidirectional message channel to one client.
#[async_trait]
pub trait MessageChannel: Send {
    /// Next data message. `Ok(None)` once the peer has closed the channel.
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError>;

    async fn send(&mut self, text: String) -> Result<(), ChannelError>;
}

#[async_trait]
impl MessageChannel for WebSocket {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        loop {
            match self.recv().await {
                None => return Ok(None),
                Some(Err(err)) => return Err(ChannelError::Receive(err.to_string())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Control frames are answered by the websocket layer.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        WebSocket::send(self, Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }
}
