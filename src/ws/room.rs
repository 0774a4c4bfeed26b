use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, MutexGuard, Notify, OnceCell};

use crate::models::{Comment, MediaFile, User};

/// What a connection hands to a room: its outgoing queue and its close signal.
///
/// Frames are pushed with `try_send` only, so holding a room lock while
/// enqueueing never waits on a socket.
#[derive(Clone, Debug)]
pub struct SessionLink {
    outbox: mpsc::Sender<Arc<str>>,
    closer: Arc<Notify>,
}

impl SessionLink {
    /// Create a link and the receiving end drained by the connection's writer
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                outbox,
                closer: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    pub fn try_send(&self, frame: Arc<str>) -> Result<(), SendFailure> {
        self.outbox.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::QueueFull,
            TrySendError::Closed(_) => SendFailure::Disconnected,
        })
    }

    /// Ask the connection to close its transport
    pub fn force_close(&self) {
        self.closer.notify_one();
    }

    pub fn closer(&self) -> Arc<Notify> {
        self.closer.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    QueueFull,
    Disconnected,
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailure::QueueFull => write!(f, "outgoing queue is full"),
            SendFailure::Disconnected => write!(f, "connection is gone"),
        }
    }
}

/// A connection attached to a room
#[derive(Debug)]
pub struct ClientHandle {
    pub session_id: String,
    pub user: User,
    pub last_ping: Instant,
    link: SessionLink,
}

impl ClientHandle {
    pub fn new(session_id: String, user: User, link: SessionLink) -> Self {
        Self {
            session_id,
            user,
            last_ping: Instant::now(),
            link,
        }
    }

    pub fn try_send(&self, frame: Arc<str>) -> Result<(), SendFailure> {
        self.link.try_send(frame)
    }

    pub fn force_close(&self) {
        self.link.force_close();
    }
}

/// Mutable fields of a room, guarded by the room lock
#[derive(Debug, Default)]
pub struct RoomState {
    pub content: String,
    pub clients: HashMap<String, ClientHandle>,
    pub comments: Vec<Comment>,
    pub media: Vec<MediaFile>,
    /// Set once the room has left the registry; joins must retry and writes must not reach the store
    pub retired: bool,
}

impl RoomState {
    pub fn users(&self) -> Vec<User> {
        self.clients.values().map(|c| c.user.clone()).collect()
    }
}

/// Durable parts a room is hydrated with
pub type RoomContents = (String, Vec<Comment>, Vec<MediaFile>);

/// One live collaboration session.
///
/// The state lock is only held for in-memory work. Store writes of a room
/// take turns on a separate lock, acquired after the state lock is released.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub created_at: DateTime<Utc>,
    state: Mutex<RoomState>,
    hydrated: OnceCell<()>,
    prior_deletion: Option<watch::Receiver<()>>,
    writes: Mutex<()>,
}

impl Room {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            created_at: Utc::now(),
            state: Mutex::new(RoomState::default()),
            hydrated: OnceCell::new(),
            prior_deletion: None,
            writes: Mutex::new(()),
        }
    }

    /// A room whose hydration waits until the durable state of its predecessor is deleted.
    /// The deletion is over once every sender of `prior` is dropped.
    pub fn after_deletion(code: &str, prior: watch::Receiver<()>) -> Self {
        Self {
            prior_deletion: Some(prior),
            ..Self::new(code)
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Serializes store writes of this room
    pub async fn write_turn(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().await
    }

    /// Fill the room from `load` the first time it is called. Concurrent callers wait for that one load.
    pub async fn hydrate_once<F, Fut>(&self, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RoomContents>,
    {
        self.hydrated
            .get_or_init(|| async {
                if let Some(prior) = &self.prior_deletion {
                    let mut prior = prior.clone();
                    // Nothing is ever sent; this returns when the deleting side drops its sender
                    let _ = prior.changed().await;
                }
                let (content, comments, media) = load().await;
                let mut state = self.state.lock().await;
                state.content = content;
                state.comments = comments;
                state.media = media;
            })
            .await;
    }

    /// Whether the room has existed for at least `max_age`
    pub fn is_older_than(&self, max_age: std::time::Duration) -> bool {
        (Utc::now() - self.created_at)
            .to_std()
            .map(|age| age >= max_age)
            .unwrap_or(false)
    }
}
