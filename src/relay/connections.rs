//! Registry of live client sessions.
//!
//! Uses a read-write lock: snapshots and broadcasts take the read side and
//! may run concurrently, while add/remove are exclusive.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub connected_at: SystemTime,
}

impl ConnectionInfo {
    pub fn new(id: ConnectionId, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer,
            connected_at: SystemTime::now(),
        }
    }
}

struct Entry {
    info: ConnectionInfo,
    notices: mpsc::UnboundedSender<String>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, Entry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. The entry is removed when the returned guard drops.
    ///
    /// `notices` receives text pushed through [`broadcast`](Self::broadcast).
    /// Re-adding an existing id replaces its entry.
    pub fn add(
        &self,
        info: ConnectionInfo,
        notices: mpsc::UnboundedSender<String>,
    ) -> ConnectionGuard {
        let id = info.id;
        self.inner.write().insert(id, Entry { info, notices });
        ConnectionGuard {
            registry: self.clone(),
            id,
        }
    }

    /// Returns `true` if the connection was registered.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.inner.write().remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.inner.read().values().map(|e| e.info.clone()).collect()
    }

    /// Queue `text` for every live session. Returns how many accepted it.
    pub fn broadcast(&self, text: &str) -> usize {
        self.inner
            .read()
            .values()
            .filter(|entry| entry.notices.send(text.to_string()).is_ok())
            .count()
    }
}

/// Scoped registration: removes the connection from the registry on drop.
pub struct ConnectionGuard {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            tracing::debug!(connection_id = %self.id, "Connection deregistered");
        }
    }
}
