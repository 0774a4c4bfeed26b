use crate::{
    models::{ErrorResponse, RoomPurgeResponse, RoomSummary},
    ws::registry::RoomRegistry,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

/// Summary of a room resident in memory
pub async fn room_summary(
    State(registry): State<Arc<RoomRegistry>>,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<RoomSummary>), (StatusCode, Json<ErrorResponse>)> {
    match registry.summary(&code).await {
        Some(summary) => Ok((StatusCode::OK, Json(summary))),
        None => Err(ErrorResponse::with_status(
            StatusCode::NOT_FOUND,
            format!("Room '{}' is not active", code),
        )),
    }
}

/// Disconnect everyone from a room and erase it, in memory and in storage
pub async fn room_purge(
    State(registry): State<Arc<RoomRegistry>>,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<RoomPurgeResponse>), (StatusCode, Json<ErrorResponse>)> {
    if code.trim().is_empty() {
        return Err(ErrorResponse::with_status(
            StatusCode::BAD_REQUEST,
            "Room code is required",
        ));
    }

    match registry.purge(&code).await {
        Ok(outcome) => {
            info!("Room '{}' purged on request", code);
            Ok((
                StatusCode::OK,
                Json(RoomPurgeResponse {
                    success: true,
                    resident: outcome.resident,
                    disconnected: outcome.disconnected as u32,
                }),
            ))
        }
        Err(e) => {
            error!("Failed to purge room '{}': {}", code, e);
            Err(ErrorResponse::with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to purge room '{}': {}", code, e),
            ))
        }
    }
}
