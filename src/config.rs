use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, error};

use crate::ws::monitor::MonitorSettings;
use crate::ws::registry::RegistrySettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Database URL. Rooms are kept in process memory only when absent.
    pub db_url: Option<String>,

    /// Root directory of uploaded room files
    #[serde(default = "default_files_dir")]
    pub files_dir: String,

    /// How often the liveness monitor scans for silent sessions
    #[serde(default = "default_ping_check_interval_secs")]
    pub ping_check_interval_secs: u64,

    /// Silence after which a session is considered dead
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    /// How often the retention sweeper runs
    #[serde(default = "default_room_cleanup_interval_secs")]
    pub room_cleanup_interval_secs: u64,

    /// Age after which a room is deleted
    #[serde(default = "default_room_max_age_hours")]
    pub room_max_age_hours: u64,

    /// Capacity of each session's outgoing message queue
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,

    /// Upper bound for a single websocket write
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "prod" || self.environment.to_lowercase() == "production"
    }

    pub fn ping_check_interval(&self) -> Duration {
        Duration::from_secs(self.ping_check_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn room_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.room_cleanup_interval_secs)
    }

    pub fn room_max_age(&self) -> Duration {
        Duration::from_secs(self.room_max_age_hours * 60 * 60)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Settings handed to the room registry
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            room_max_age: self.room_max_age(),
            outbound_queue_size: self.outbound_queue_size.max(1),
            send_timeout: self.send_timeout(),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            ping_check_interval: self.ping_check_interval(),
            ping_timeout: self.ping_timeout(),
            room_cleanup_interval: self.room_cleanup_interval(),
            room_max_age: self.room_max_age(),
        }
    }

    /// Parsed list of allowed CORS origins. `None` allows any origin.
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        self.cors_origins.as_ref().map(|origins| {
            origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            db_url: None,
            files_dir: default_files_dir(),
            ping_check_interval_secs: default_ping_check_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            room_cleanup_interval_secs: default_room_cleanup_interval_secs(),
            room_max_age_hours: default_room_max_age_hours(),
            outbound_queue_size: default_outbound_queue_size(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_files_dir() -> String {
    "./uploads".to_string()
}

fn default_ping_check_interval_secs() -> u64 {
    45
}

fn default_ping_timeout_secs() -> u64 {
    60
}

fn default_room_cleanup_interval_secs() -> u64 {
    2 * 60 * 60
}

fn default_room_max_age_hours() -> u64 {
    24
}

fn default_outbound_queue_size() -> usize {
    256
}

fn default_send_timeout_ms() -> u64 {
    5_000
}
