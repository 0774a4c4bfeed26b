
use serde::{Deserialize, Serialize};
use crate::models::{Comment, MediaFile, User};

/// Every client message type this server understands.
pub const RECEIVED_TYPES: [&str; 9] = [
    "join-room",
    "text-update",
    "ping",
    "comment-add",
    "comment-update",
    "comment-delete",
    "user-activity",
    "media-upload",
    "media-delete",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub user: User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextUpdateMessage {
    #[serde(default)]
    pub code: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentMessage {
    pub code: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentMessage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub comment: Comment,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentsMessage {
    pub code: String,
    pub comments: Vec<Comment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserMessage {
    pub code: String,
    pub user: User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsersMessage {
    pub code: String,
    pub users: Vec<User>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityMessage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub is_typing: bool,
    #[serde(default)]
    pub current_line: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub media: MediaFile,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSyncMessage {
    pub code: String,
    pub media_files: Vec<MediaFile>,
}

/// Messages sent by clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "join-room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "text-update")]
    TextUpdate(TextUpdateMessage),
    #[serde(rename = "ping")]
    Ping(PingMessage),
    #[serde(rename = "comment-add")]
    CommentAdd(CommentMessage),
    #[serde(rename = "comment-update")]
    CommentUpdate(CommentMessage),
    #[serde(rename = "comment-delete")]
    CommentDelete(CommentMessage),
    #[serde(rename = "user-activity")]
    UserActivity(UserActivityMessage),
    #[serde(rename = "media-upload")]
    MediaUpload(MediaMessage),
    #[serde(rename = "media-delete")]
    MediaDelete(MediaMessage),
}

impl ReceivedMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ReceivedMessage::JoinRoom(_) => "join-room",
            ReceivedMessage::TextUpdate(_) => "text-update",
            ReceivedMessage::Ping(_) => "ping",
            ReceivedMessage::CommentAdd(_) => "comment-add",
            ReceivedMessage::CommentUpdate(_) => "comment-update",
            ReceivedMessage::CommentDelete(_) => "comment-delete",
            ReceivedMessage::UserActivity(_) => "user-activity",
            ReceivedMessage::MediaUpload(_) => "media-upload",
            ReceivedMessage::MediaDelete(_) => "media-delete",
        }
    }

    /// Decode one text frame.
    ///
    /// The envelope is read first so that a missing or unknown `type` can be
    /// told apart from a known type with a broken payload.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(DecodeError::Malformed)?;
        let kind = envelope.kind.ok_or(DecodeError::MissingType)?;
        if !RECEIVED_TYPES.contains(&kind.as_str()) {
            return Err(DecodeError::UnknownType(kind));
        }
        serde_json::from_str(text).map_err(|source| DecodeError::InvalidPayload { kind, source })
    }
}

/// Messages sent by the server, either as direct replies or room broadcasts
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "initial-content")]
    InitialContent(ContentMessage),
    #[serde(rename = "text-update")]
    TextUpdate(TextUpdateMessage),
    #[serde(rename = "comments-sync")]
    CommentsSync(CommentsMessage),
    #[serde(rename = "comment-add")]
    CommentAdd(CommentMessage),
    #[serde(rename = "comment-delete")]
    CommentDelete(CommentMessage),
    #[serde(rename = "media-sync")]
    MediaSync(MediaSyncMessage),
    #[serde(rename = "media-upload")]
    MediaUpload(MediaMessage),
    #[serde(rename = "media-delete")]
    MediaDelete(MediaMessage),
    #[serde(rename = "users-sync")]
    UsersSync(UsersMessage),
    #[serde(rename = "user-joined")]
    UserJoined(UserMessage),
    #[serde(rename = "user-left")]
    UserLeft(UserMessage),
    #[serde(rename = "user-activity")]
    UserActivity(UserActivityMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
}

impl SendMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SendMessage::InitialContent(_) => "initial-content",
            SendMessage::TextUpdate(_) => "text-update",
            SendMessage::CommentsSync(_) => "comments-sync",
            SendMessage::CommentAdd(_) => "comment-add",
            SendMessage::CommentDelete(_) => "comment-delete",
            SendMessage::MediaSync(_) => "media-sync",
            SendMessage::MediaUpload(_) => "media-upload",
            SendMessage::MediaDelete(_) => "media-delete",
            SendMessage::UsersSync(_) => "users-sync",
            SendMessage::UserJoined(_) => "user-joined",
            SendMessage::UserLeft(_) => "user-left",
            SendMessage::UserActivity(_) => "user-activity",
            SendMessage::Pong(_) => "pong",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Why an inbound frame was dropped
#[derive(Debug)]
pub enum DecodeError {
    Malformed(serde_json::Error),
    MissingType,
    UnknownType(String),
    InvalidPayload { kind: String, source: serde_json::Error },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "malformed message: {}", e),
            DecodeError::MissingType => write!(f, "message has no type"),
            DecodeError::UnknownType(kind) => write!(f, "unknown message type '{}'", kind),
            DecodeError::InvalidPayload { kind, source } => {
                write!(f, "invalid '{}' payload: {}", kind, source)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Malformed(e) => Some(e),
            DecodeError::InvalidPayload { source, .. } => Some(source),
            _ => None,
        }
    }
}
