use crate::{
    config::Config,
    docs::ApiDoc,
    handlers::{diagnostics, health_check, ready_check, room_purge, room_summary},
    websocket::websocket_handler,
    ws::registry::RoomRegistry,
};
use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create API routes
pub fn create_api_routes(registry: Arc<RoomRegistry>) -> Router {
    Router::<Arc<RoomRegistry>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/rooms/:code", get(room_summary).delete(room_purge))
        .with_state(registry)
}

/// The whole application: websocket endpoint, API, Swagger UI and the HTTP layers
pub fn create_app(registry: Arc<RoomRegistry>, config: &Config) -> Router {
    let ws_routes = Router::<Arc<RoomRegistry>>::new()
        .route("/ws", get(websocket_handler))
        .with_state(registry.clone());

    Router::new()
        .merge(ws_routes)
        .nest("/api", create_api_routes(registry))
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let Some(origins) = config.cors_origin_list() else {
        return CorsLayer::permissive();
    };
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
