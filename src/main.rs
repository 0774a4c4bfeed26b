mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod utils;
mod websocket;
mod ws;

use config::Config;
use db::blob::FsBlobStore;
use db::dbrooms::DbRooms;
use db::memory::MemoryRoomStore;
use db::RoomStore;
use routes::create_app;
use std::panic;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use ws::monitor::spawn_monitors;
use ws::registry::RoomRegistry;

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "roomsync=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    info!("Environment: {} (log level {})", config.environment, config.log_level);

    // Room storage: Postgres when configured, process memory otherwise
    let store: Arc<dyn RoomStore> = match &config.db_url {
        Some(db_url) => {
            let db = DbRooms::new(db_url).await.unwrap_or_else(|e| {
                error!("Failed to connect to database: {}", e);
                std::process::exit(1);
            });
            if let Err(e) = db.ensure_schema().await {
                error!("Failed to initialize database schema: {}", e);
                std::process::exit(1);
            }
            info!("Database initialized successfully");
            Arc::new(db)
        }
        None => {
            if config.is_production() {
                error!("No database URL configured in production - room state will not survive a restart");
            } else if config.is_development() {
                info!("No database URL configured - rooms are kept in memory only");
            } else {
                warn!("No database URL configured - rooms are kept in memory only");
            }
            Arc::new(MemoryRoomStore::new())
        }
    };

    let registry = Arc::new(
        RoomRegistry::new(store, config.registry_settings())
            .with_blob_store(Arc::new(FsBlobStore::new(&config.files_dir))),
    );
    spawn_monitors(registry.clone(), config.monitor_settings());

    let app = create_app(registry, &config);

    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
