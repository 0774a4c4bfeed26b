use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::broadcast::{broadcast, send_direct};
use super::registry::RoomRegistry;
use super::room::{ClientHandle, Room, RoomState, SessionLink};
use crate::models::{
    CommentMessage, CommentsMessage, ContentMessage, JoinRoomMessage, MediaMessage,
    MediaSyncMessage, PongMessage, ReceivedMessage, SendMessage, TextUpdateMessage, User,
    UserActivityMessage, UserMessage, UsersMessage,
};

const USER_COLORS: [&str; 8] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
];
const NAME_ADJECTIVES: [&str; 8] = ["Red", "Blue", "Green", "Yellow", "Purple", "Orange", "Pink", "Brown"];
const NAME_NOUNS: [&str; 8] = ["Cat", "Dog", "Bird", "Fish", "Bear", "Lion", "Tiger", "Wolf"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined { code: String },
    Closed,
}

/// Protocol state of one connection. Messages are handled one at a time in arrival order.
pub struct ConnectionSession {
    session_id: String,
    registry: Arc<RoomRegistry>,
    link: SessionLink,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(registry: Arc<RoomRegistry>, link: SessionLink) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            registry,
            link,
            state: SessionState::Unjoined,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Decode and handle one text frame. Undecodable frames are logged and dropped.
    pub async fn handle_text(&mut self, text: &str) {
        match ReceivedMessage::decode(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => warn!("Session {}: dropping message: {}", self.session_id, e),
        }
    }

    pub async fn handle(&mut self, message: ReceivedMessage) {
        if self.state == SessionState::Closed {
            debug!("Session {} is closed, ignoring {}", self.session_id, message.kind());
            return;
        }

        let message = match message {
            ReceivedMessage::JoinRoom(join) => {
                self.join_room(join).await;
                return;
            }
            other => other,
        };

        let SessionState::Joined { code } = &self.state else {
            debug!("Session {} has not joined a room, ignoring {}", self.session_id, message.kind());
            return;
        };
        let code = code.clone();
        let Some(room) = self.registry.get(&code).await else {
            debug!("Room {} is gone, ignoring {}", code, message.kind());
            return;
        };

        match message {
            ReceivedMessage::JoinRoom(_) => {}
            ReceivedMessage::TextUpdate(update) => self.text_update(&room, update).await,
            ReceivedMessage::Ping(_) => self.ping(&room).await,
            ReceivedMessage::CommentAdd(add) => self.comment_add(&room, add).await,
            ReceivedMessage::CommentUpdate(update) => {
                debug!(
                    "Session {}: comment updates are not supported yet, ignoring comment {}",
                    self.session_id, update.comment.id
                );
            }
            ReceivedMessage::CommentDelete(delete) => self.comment_delete(&room, delete).await,
            ReceivedMessage::UserActivity(activity) => self.user_activity(&room, activity).await,
            ReceivedMessage::MediaUpload(upload) => self.media_upload(&room, upload).await,
            ReceivedMessage::MediaDelete(delete) => self.media_delete(&room, delete).await,
        }
    }

    /// Leave the current room and stop handling messages. Runs its cleanup once.
    pub async fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Closed);
        let was_open = previous != SessionState::Closed;
        if let SessionState::Joined { code } = previous {
            self.registry.leave_room(&code, &self.session_id).await;
        }
        if was_open {
            info!("Session {} closed", self.session_id);
        }
    }

    async fn join_room(&mut self, join: JoinRoomMessage) {
        if let SessionState::Joined { code } = &self.state {
            let previous = code.clone();
            self.registry.leave_room(&previous, &self.session_id).await;
            self.state = SessionState::Unjoined;
        }

        let code = join.code;
        let mut user = join.user;
        if user.id.is_empty() {
            user.id = self.session_id.clone();
        }
        if user.name.is_empty() {
            user.name = random_user_name();
        }
        if user.color.is_empty() {
            user.color = random_user_color();
        }
        user.last_seen = Utc::now();

        info!("Session {} joining room {} as {}", self.session_id, code, user.name);

        let client = ClientHandle::new(self.session_id.clone(), user.clone(), self.link.clone());
        let session_id = self.session_id.clone();
        let link = self.link.clone();
        self.registry
            .attach(&code, client, |room, state| {
                send_snapshots(&session_id, &link, room, state);
                let joined = SendMessage::UserJoined(UserMessage {
                    code: room.code.clone(),
                    user,
                });
                broadcast(&state.clients, &joined, Some(&session_id));
            })
            .await;

        self.state = SessionState::Joined { code };
    }

    /// The user this session is attached as, if it is still attached to `room`
    async fn member(&self, room: &Room) -> Option<User> {
        let state = room.lock().await;
        state.clients.get(&self.session_id).map(|c| c.user.clone())
    }

    async fn text_update(&self, room: &Room, update: TextUpdateMessage) {
        {
            let mut state = room.lock().await;
            if !state.clients.contains_key(&self.session_id) {
                return;
            }
            state.content = update.content;

            let relay = SendMessage::TextUpdate(TextUpdateMessage {
                code: room.code.clone(),
                content: state.content.clone(),
            });
            broadcast(&state.clients, &relay, Some(&self.session_id));
        }

        // Saves take turns and each writes the newest text, so the store ends where memory is.
        let _turn = room.write_turn().await;
        let content = {
            let state = room.lock().await;
            if state.retired {
                return;
            }
            state.content.clone()
        };
        if let Err(e) = self.registry.store().save_room_content(&room.code, &content).await {
            error!("Error saving content for room {}: {}", room.code, e);
        }
    }

    async fn ping(&self, room: &Room) {
        {
            let mut state = room.lock().await;
            let Some(client) = state.clients.get_mut(&self.session_id) else {
                return;
            };
            client.last_ping = Instant::now();
            client.user.last_seen = Utc::now();
        }
        let pong = SendMessage::Pong(PongMessage { code: room.code.clone() });
        send_direct(&self.session_id, &self.link, &pong);
    }

    async fn comment_add(&self, room: &Room, add: CommentMessage) {
        let Some(author) = self.member(room).await else {
            return;
        };

        let mut comment = add.comment;
        comment.id = Uuid::now_v7().to_string();
        comment.timestamp = Utc::now();
        comment.author = author.name;
        comment.author_id = author.id;

        let _turn = room.write_turn().await;
        if room.lock().await.retired {
            return;
        }
        if let Err(e) = self.registry.store().save_comment(&room.code, &comment).await {
            error!("Error saving comment in room {}: {}", room.code, e);
            return;
        }

        let mut state = room.lock().await;
        state.comments.push(comment.clone());
        let added = SendMessage::CommentAdd(CommentMessage {
            code: room.code.clone(),
            comment,
        });
        broadcast(&state.clients, &added, None);
    }

    // Any participant may delete any comment; there is no ownership check.
    async fn comment_delete(&self, room: &Room, delete: CommentMessage) {
        let id = delete.comment.id;
        {
            let state = room.lock().await;
            if !state.clients.contains_key(&self.session_id) {
                return;
            }
            if !state.comments.iter().any(|c| c.id == id) {
                debug!("Comment {} not found in room {}", id, room.code);
                return;
            }
        }

        let _turn = room.write_turn().await;
        if room.lock().await.retired {
            return;
        }
        if let Err(e) = self.registry.store().delete_comment(&id).await {
            error!("Error deleting comment {} in room {}: {}", id, room.code, e);
            return;
        }

        let mut state = room.lock().await;
        // Another session may have deleted it while the store was busy
        let Some(position) = state.comments.iter().position(|c| c.id == id) else {
            return;
        };
        let comment = state.comments.remove(position);
        let deleted = SendMessage::CommentDelete(CommentMessage {
            code: room.code.clone(),
            comment,
        });
        broadcast(&state.clients, &deleted, None);
    }

    async fn user_activity(&self, room: &Room, activity: UserActivityMessage) {
        let mut state = room.lock().await;
        let Some(client) = state.clients.get_mut(&self.session_id) else {
            return;
        };
        client.user.is_typing = activity.is_typing;
        client.user.current_line = activity.current_line;
        client.user.last_seen = Utc::now();

        let relay = SendMessage::UserActivity(UserActivityMessage {
            code: room.code.clone(),
            user_id: client.user.id.clone(),
            is_typing: activity.is_typing,
            current_line: activity.current_line,
        });
        broadcast(&state.clients, &relay, Some(&self.session_id));
    }

    async fn media_upload(&self, room: &Room, upload: MediaMessage) {
        let Some(uploader) = self.member(room).await else {
            return;
        };

        let mut media = upload.media;
        media.uploaded_by = uploader.name;
        if media.id.is_empty() {
            media.id = Uuid::new_v4().to_string();
        }
        if media.uploaded_at == DateTime::<Utc>::default() {
            media.uploaded_at = Utc::now();
        }

        let _turn = room.write_turn().await;
        if room.lock().await.retired {
            return;
        }
        if let Err(e) = self.registry.store().save_media_file(&room.code, &media).await {
            error!("Error saving media file in room {}: {}", room.code, e);
            return;
        }

        let mut state = room.lock().await;
        state.media.push(media.clone());
        let uploaded = SendMessage::MediaUpload(MediaMessage {
            code: room.code.clone(),
            media,
        });
        broadcast(&state.clients, &uploaded, None);
    }

    async fn media_delete(&self, room: &Room, delete: MediaMessage) {
        let id = delete.media.id;
        {
            let state = room.lock().await;
            if !state.clients.contains_key(&self.session_id) {
                return;
            }
            if !state.media.iter().any(|m| m.id == id) {
                debug!("Media file {} not found in room {}", id, room.code);
                return;
            }
        }

        let turn = room.write_turn().await;
        if room.lock().await.retired {
            return;
        }
        if let Err(e) = self.registry.store().delete_media_file(&id).await {
            error!("Error deleting media file {} in room {}: {}", id, room.code, e);
            return;
        }

        let media = {
            let mut state = room.lock().await;
            let Some(position) = state.media.iter().position(|m| m.id == id) else {
                return;
            };
            let media = state.media.remove(position);
            let deleted = SendMessage::MediaDelete(MediaMessage {
                code: room.code.clone(),
                media: media.clone(),
            });
            broadcast(&state.clients, &deleted, None);
            media
        };
        drop(turn);

        if let Some(blobs) = self.registry.blobs().filter(|_| !media.url.is_empty()) {
            if let Err(e) = blobs.delete(&media.url).await {
                warn!("Could not delete file {} of room {}: {}", media.url, room.code, e);
            }
        }
    }
}

/// Content, comments, media and users, in that order. Each send stands on its own.
fn send_snapshots(session_id: &str, link: &SessionLink, room: &Room, state: &RoomState) {
    let code = room.code.clone();
    let snapshots = [
        SendMessage::InitialContent(ContentMessage {
            code: code.clone(),
            content: state.content.clone(),
        }),
        SendMessage::CommentsSync(CommentsMessage {
            code: code.clone(),
            comments: state.comments.clone(),
        }),
        SendMessage::MediaSync(MediaSyncMessage {
            code: code.clone(),
            media_files: state.media.clone(),
        }),
        SendMessage::UsersSync(UsersMessage {
            code,
            users: state.users(),
        }),
    ];
    for snapshot in &snapshots {
        send_direct(session_id, link, snapshot);
    }
}

fn random_user_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = NAME_ADJECTIVES.choose(&mut rng).copied().unwrap_or("Anonymous");
    let noun = NAME_NOUNS.choose(&mut rng).copied().unwrap_or("User");
    format!("{} {}", adjective, noun)
}

fn random_user_color() -> String {
    let mut rng = rand::thread_rng();
    USER_COLORS.choose(&mut rng).copied().unwrap_or(USER_COLORS[0]).to_string()
}
