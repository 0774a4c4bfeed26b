use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::debug;

use crate::models::HealthResponse;
use crate::ws::registry::RoomRegistry;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(registry): State<Arc<RoomRegistry>>) -> Json<HealthResponse> {
    debug!("Readiness check requested");
    let stats = registry.stats().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!(
            "Service is ready ({} room(s), {} session(s))",
            stats.rooms, stats.sessions
        ),
    })
}
