use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::provider::HealthTracker;
use crate::relay::{ConnectionRegistry, RelaySession};
use crate::server::health::{health, status};
use crate::server::shutdown::ShutdownManager;

#[derive(Clone)]
pub struct AppState {
    pub session: RelaySession,
    pub tracker: HealthTracker,
    pub connections: ConnectionRegistry,
    pub shutdown: Arc<ShutdownManager>,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/ws", get(relay_upgrade))
        .with_state(state)
}

/// Upgrade to a websocket and hand the socket to a relay session.
/// Any origin is accepted.
async fn relay_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let session = state.session.clone();
    ws.on_failed_upgrade(move |err| {
        tracing::warn!(peer = %peer, error = %err, "Websocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        session.run(socket, Some(peer)).await;
    })
}
