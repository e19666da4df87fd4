use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;

use crate::relay::ConnectionRegistry;

pub struct ShutdownManager {
    shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Wait for Ctrl-C or SIGTERM, then signal shutdown.
    pub async fn listen_for_signals(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                result = signal::ctrl_c() => result?,
                _ = sigterm.recv() => {},
                _ = self.wait() => return Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = signal::ctrl_c() => result?,
                _ = self.wait() => return Ok(()),
            }
        }

        tracing::info!("Shutdown signal received");
        self.signal_shutdown();
        Ok(())
    }

    pub fn signal_shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been signaled.
    pub async fn wait(&self) {
        // Register interest before checking the flag so a concurrent
        // signal_shutdown() cannot slip between the two.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }

    /// Wait until every session has left the registry, or `timeout` elapses.
    pub async fn wait_for_connections(&self, connections: &ConnectionRegistry, timeout: Duration) {
        tracing::info!(active = connections.len(), "Waiting for active connections");

        let start = tokio::time::Instant::now();

        while start.elapsed() < timeout {
            if connections.is_empty() {
                tracing::info!("Server stopped");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::warn!(
            remaining = connections.len(),
            "Forced shutdown after timeout"
        );
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_returns_after_signal() {
        let shutdown = Arc::new(ShutdownManager::new());
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        shutdown.signal_shutdown();
        waiter.await.unwrap();
        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn test_wait_after_signal_returns_immediately() {
        let shutdown = ShutdownManager::new();
        shutdown.signal_shutdown();
        shutdown.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_connections_times_out() {
        let shutdown = ShutdownManager::new();
        let connections = ConnectionRegistry::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let _guard = connections.add(
            crate::relay::ConnectionInfo::new(crate::relay::ConnectionId::new(), None),
            tx,
        );

        let start = tokio::time::Instant::now();
        shutdown
            .wait_for_connections(&connections, Duration::from_secs(2))
            .await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
