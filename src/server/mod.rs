pub mod health;
pub mod monitor;
pub mod router;
pub mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::provider::{HealthTracker, ProviderError};
use crate::relay::{ConnectionRegistry, RelaySession, SinkPublisher};
use crate::server::monitor::ProviderMonitor;
use crate::server::router::{build_router, AppState};
use crate::server::shutdown::ShutdownManager;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_NOTICE: &str = "Server shutting down";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address '{addr}': {source}")]
    InvalidBindAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("try_bind() must be called before run()")]
    NotBound,

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub struct RelayServer {
    pub addr: SocketAddr,
    /// Bound listener, populated by try_bind() and consumed by run().
    listener: Option<TcpListener>,
    config: Config,
    tracker: HealthTracker,
    connections: ConnectionRegistry,
    session: RelaySession,
    shutdown: Arc<ShutdownManager>,
}

impl RelayServer {
    pub fn new(config: Config, sink: Arc<dyn SinkPublisher>) -> Result<Self, ProviderError> {
        let tracker = HealthTracker::from_config(&config)?;
        Ok(Self::with_tracker(config, tracker, sink))
    }

    /// Build a server around an existing tracker (custom latency or selection).
    pub fn with_tracker(config: Config, tracker: HealthTracker, sink: Arc<dyn SinkPublisher>) -> Self {
        let connections = ConnectionRegistry::new();
        let session = RelaySession::new(
            tracker.clone(),
            sink,
            connections.clone(),
            config.sink.content_type.clone(),
        );
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 0)), // Determined at bind time
            listener: None,
            config,
            tracker,
            connections,
            session,
            shutdown: Arc::new(ShutdownManager::new()),
        }
    }

    /// Bind the configured address. Failure is fatal; there is no port fallback.
    pub async fn try_bind(&mut self) -> Result<SocketAddr, ServerError> {
        let bind_addr = &self.config.server.bind_addr;
        let addr: SocketAddr = bind_addr.parse().map_err(|source| ServerError::InvalidBindAddr {
            addr: bind_addr.clone(),
            source,
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let actual = listener.local_addr().map_err(|source| ServerError::Bind { addr, source })?;

        self.addr = actual;
        self.listener = Some(listener);
        tracing::info!("Relay bound to {}", actual);
        Ok(actual)
    }

    pub fn tracker(&self) -> HealthTracker {
        self.tracker.clone()
    }

    pub fn connections(&self) -> ConnectionRegistry {
        self.connections.clone()
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Serve until shutdown, then notify sessions and let them drain.
    ///
    /// Consumes self to take ownership of the pre-bound listener.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.listener.ok_or(ServerError::NotBound)?;

        tracing::info!("Starting relay server on {}", self.addr);

        let signals = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(err) = shutdown.listen_for_signals().await {
                    tracing::warn!(error = %err, "Signal handler unavailable");
                }
            })
        };

        let monitor = ProviderMonitor::new(self.tracker.clone(), self.config.health.monitor_interval())
            .spawn(self.shutdown.clone());

        let app = build_router(AppState {
            session: self.session,
            tracker: self.tracker,
            connections: self.connections.clone(),
            shutdown: self.shutdown.clone(),
            started_at: Instant::now(),
        });

        let shutdown = self.shutdown.clone();
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await;

        // Make sure background tasks stop even if serving failed.
        self.shutdown.signal_shutdown();
        served.map_err(ServerError::Serve)?;

        let notified = self.connections.broadcast(SHUTDOWN_NOTICE);
        tracing::info!(sessions = notified, "Notified sessions of shutdown");
        self.shutdown
            .wait_for_connections(&self.connections, DRAIN_TIMEOUT)
            .await;

        if let Err(err) = monitor.await {
            tracing::error!(error = %err, "Provider monitor task failed");
        }
        let _ = signals.await;
        tracing::info!("Shutting down gracefully");

        Ok(())
    }
}

#[derive(Clone)]
pub struct RelayHandle {
    shutdown: Arc<ShutdownManager>,
}

impl RelayHandle {
    pub fn shutdown(&self) {
        self.shutdown.signal_shutdown();
    }
}
