use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A participant as seen by the other members of a room.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub color: String,
    pub last_seen: DateTime<Utc>,
    pub is_typing: bool,
    pub current_line: Option<i64>,
}

/// A comment anchored to a line (or a line range) of the room text.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub id: String,
    pub line_number: Option<i64>,
    pub line_range: Option<String>,
    pub author: String,
    pub author_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Metadata of a file shared in a room. The bytes live with the blob store.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: i64,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

/// Live summary of a resident room
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub content_length: usize,
    pub n_sessions: u32,
    pub n_comments: u32,
    pub n_media: u32,
    pub users: Vec<User>,
}

/// Response returned after purging a room
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RoomPurgeResponse {
    pub success: bool,
    /// Whether the room was resident in memory when purged
    pub resident: bool,
    /// Number of sessions that were force-disconnected
    pub disconnected: u32,
}
