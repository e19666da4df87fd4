use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::server::router::AppState;

/// Liveness only: always `200 OK`, no dependency checks.
pub async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct RelayStatus {
    pub active_provider: u32,
    pub providers: Vec<u32>,
    pub error_count: u32,
    pub failovers: u64,
    pub connections: usize,
    pub uptime_seconds: u64,
    pub shutting_down: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<RelayStatus> {
    let health = state.tracker.snapshot();
    Json(RelayStatus {
        active_provider: health.active_provider_id,
        providers: state.tracker.registry().ids(),
        error_count: health.error_count,
        failovers: health.failovers,
        connections: state.connections.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        shutting_down: state.shutdown.is_shutting_down(),
    })
}
