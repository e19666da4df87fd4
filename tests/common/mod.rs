//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use text_relay::provider::{
    HealthPolicy, HealthTracker, LatencySource, Provider, ProviderRegistry, RoundRobinPicker,
};
use text_relay::relay::{ChannelError, MessageChannel, OutboundMessage, SinkError, SinkPublisher};
use tokio::sync::mpsc;

pub const SLOW: Duration = Duration::from_millis(2500);
pub const FAST: Duration = Duration::from_millis(100);

/// Find an available port for testing.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to free port");
    listener.local_addr().unwrap().port()
}

/// Wait for a server to become available.
pub async fn wait_for_server(addr: SocketAddr, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// -- Latency ------------------------------------------------------------------

/// Plays back a fixed latency sequence, then repeats `fallback`.
pub struct ScriptedLatency {
    script: Mutex<VecDeque<Duration>>,
    fallback: Duration,
}

impl ScriptedLatency {
    pub fn new(script: impl IntoIterator<Item = Duration>, fallback: Duration) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
        }
    }
}

impl LatencySource for ScriptedLatency {
    fn next_latency(&self) -> Duration {
        self.script.lock().pop_front().unwrap_or(self.fallback)
    }
}

// -- Trackers -----------------------------------------------------------------

/// Providers `1..=count`, each answering `"p{id}-a"` / `"p{id}-b"`.
pub fn registry(count: u32) -> Arc<ProviderRegistry> {
    let providers = (1..=count)
        .map(|id| Provider::new(id, vec![format!("p{id}-a"), format!("p{id}-b")]).unwrap())
        .collect();
    Arc::new(ProviderRegistry::new(providers).unwrap())
}

pub fn tracker(
    providers: u32,
    error_threshold: u32,
    latency: impl LatencySource + 'static,
) -> HealthTracker {
    HealthTracker::new(
        registry(providers),
        HealthPolicy {
            error_threshold,
            latency_threshold: Duration::from_millis(2000),
        },
        Box::new(latency),
        Box::new(RoundRobinPicker::default()),
    )
}

// -- Sinks --------------------------------------------------------------------

/// Records every published message.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn bodies(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| String::from_utf8_lossy(&m.bytes).into_owned())
            .collect()
    }
}

#[async_trait]
impl SinkPublisher for RecordingSink {
    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Rejects every publish, counting attempts.
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl SinkPublisher for FailingSink {
    async fn publish(&self, _message: OutboundMessage) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("broker down".to_string()))
    }
}

// -- Channels -----------------------------------------------------------------

/// In-memory stand-in for a websocket.
pub struct MockChannel {
    inbound: mpsc::UnboundedReceiver<Result<Vec<u8>, ChannelError>>,
    outbound: mpsc::UnboundedSender<String>,
    fail_sends: bool,
}

/// Client side of a [`MockChannel`].
pub struct ChannelPeer {
    pub to_session: mpsc::UnboundedSender<Result<Vec<u8>, ChannelError>>,
    pub from_session: mpsc::UnboundedReceiver<String>,
}

impl ChannelPeer {
    pub fn send_text(&self, text: &str) {
        self.to_session.send(Ok(text.as_bytes().to_vec())).unwrap();
    }

    pub fn fail_read(&self) {
        self.to_session
            .send(Err(ChannelError::Receive("connection reset".to_string())))
            .unwrap();
    }

    pub async fn next_reply(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(60), self.from_session.recv())
            .await
            .expect("timed out waiting for reply")
            .expect("session closed")
    }
}

pub fn mock_channel() -> (MockChannel, ChannelPeer) {
    let (to_session, inbound) = mpsc::unbounded_channel();
    let (outbound, from_session) = mpsc::unbounded_channel();
    (
        MockChannel {
            inbound,
            outbound,
            fail_sends: false,
        },
        ChannelPeer {
            to_session,
            from_session,
        },
    )
}

impl MockChannel {
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        match self.inbound.recv().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn send(&mut self, text: String) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::Send("broken pipe".to_string()));
        }
        self.outbound
            .send(text)
            .map_err(|e| ChannelError::Send(e.to_string()))
    }
}
