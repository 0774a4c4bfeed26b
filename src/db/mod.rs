pub mod blob;
pub mod dbrooms;
pub mod memory;
pub mod util;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Comment, MediaFile};

/// Durable state of the rooms, keyed by room code.
///
/// Room, comment and media deletions are independent calls; callers log
/// partial failures instead of expecting a transaction across them.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Create the backing tables if they do not exist yet
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Text of the room, empty when the room was never saved
    async fn get_room_content(&self, code: &str) -> Result<String, StoreError>;
    async fn save_room_content(&self, code: &str, content: &str) -> Result<(), StoreError>;
    async fn delete_room_content(&self, code: &str) -> Result<(), StoreError>;

    /// Comments of the room, oldest first
    async fn get_room_comments(&self, code: &str) -> Result<Vec<Comment>, StoreError>;
    async fn save_comment(&self, code: &str, comment: &Comment) -> Result<(), StoreError>;
    async fn delete_comment(&self, id: &str) -> Result<(), StoreError>;
    async fn delete_room_comments(&self, code: &str) -> Result<(), StoreError>;

    /// Media of the room, oldest upload first
    async fn get_room_media(&self, code: &str) -> Result<Vec<MediaFile>, StoreError>;
    async fn save_media_file(&self, code: &str, media: &MediaFile) -> Result<(), StoreError>;
    async fn delete_media_file(&self, id: &str) -> Result<(), StoreError>;
    async fn delete_room_media(&self, code: &str) -> Result<(), StoreError>;

    /// Codes of the rooms created before `cutoff`
    async fn list_rooms_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Unavailable(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}
