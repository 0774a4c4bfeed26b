use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Room, session and host diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Current diagnostics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// Summary of an active room
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{code}",
    params(
        ("code" = String, Path, description = "Room code")
    ),
    responses(
        (status = 200, description = "Room is active", body = RoomSummary),
        (status = 404, description = "Room is not active", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_summary_doc() {}

/// Disconnect every session of a room and erase its content, comments and media
#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{code}",
    params(
        ("code" = String, Path, description = "Room code")
    ),
    responses(
        (status = 200, description = "Room purged", body = RoomPurgeResponse),
        (status = 500, description = "Storage failed while purging", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn room_purge_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        room_summary_doc,
        room_purge_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            ErrorResponse,
            RoomSummary,
            RoomPurgeResponse,
            User,
            Comment,
            MediaFile
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
