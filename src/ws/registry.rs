use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use super::broadcast::broadcast;
use super::room::{ClientHandle, Room, RoomContents, RoomState};
use crate::db::blob::BlobStore;
use crate::db::{RoomStore, StoreError};
use crate::models::{RoomSummary, SendMessage, UserMessage};

/// Tunables of the registry and of the connections it serves
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Empty rooms at least this old are deleted from memory and storage
    pub room_max_age: Duration,
    /// Capacity of each session's outgoing queue
    pub outbound_queue_size: usize,
    /// Upper bound for one websocket write
    pub send_timeout: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            room_max_age: Duration::from_secs(24 * 60 * 60),
            outbound_queue_size: 256,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of purging a room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub resident: bool,
    pub disconnected: usize,
}

/// Result of one retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
}

/// Aggregated counts over all resident rooms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub rooms: usize,
    pub sessions: usize,
    pub comments: usize,
    pub media: usize,
}

/// Which rooms `retire` may take out of the table
#[derive(Clone, Copy)]
enum Retire<'a> {
    /// Only when no session is attached
    IfEmpty,
    /// Only when no session is attached and `code` still maps to this room
    IfEmptyAndCurrent(&'a Arc<Room>),
    /// Always, disconnecting every session
    Force,
}

/// A code whose durable state is being deleted. Dropping it lets the next room of that code hydrate.
struct Retirement {
    code: String,
    room: Option<Arc<Room>>,
    disconnected: usize,
    done: watch::Sender<()>,
}

#[derive(Default)]
struct RoomTable {
    live: HashMap<String, Arc<Room>>,
    retiring: HashMap<String, watch::Receiver<()>>,
}

/// Process-wide table of live rooms.
///
/// Lock order is registry then room, and neither lock is held across store
/// I/O. A room is hydrated once, outside the registry lock. Destroying a room
/// marks it retired and takes it out of the table under both locks; its
/// durable state is deleted afterwards, and a room created again for the same
/// code hydrates only once that delete is over. Joins that find a retired room
/// retry, which is why a room with attached sessions is never swept.
pub struct RoomRegistry {
    rooms: RwLock<RoomTable>,
    store: Arc<dyn RoomStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    settings: RegistrySettings,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn RoomStore>, settings: RegistrySettings) -> Self {
        Self {
            rooms: RwLock::new(RoomTable::default()),
            store,
            blobs: None,
            settings,
        }
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    pub fn blobs(&self) -> Option<&Arc<dyn BlobStore>> {
        self.blobs.as_ref()
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Look up a resident room
    pub async fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.live.get(code).cloned()
    }

    /// Return the resident room for `code`, hydrating it from the store on first use
    pub async fn get_or_create(&self, code: &str) -> Arc<Room> {
        let room = match self.get(code).await {
            Some(room) => room,
            None => self.materialize(code).await,
        };
        room.hydrate_once(|| self.load(code)).await;
        room
    }

    /// Attach a client to the room `code`, creating the room if needed.
    ///
    /// `on_attached` runs under the room lock right after the client is
    /// inserted, so whatever it enqueues reaches the client before any
    /// broadcast issued later by other sessions.
    pub async fn attach<F>(&self, code: &str, client: ClientHandle, on_attached: F) -> Arc<Room>
    where
        F: FnOnce(&Room, &RoomState),
    {
        loop {
            let room = self.get_or_create(code).await;
            let mut state = room.lock().await;
            if state.retired {
                debug!("Room {} was retired while joining, retrying", code);
                continue;
            }
            let session_id = client.session_id.clone();
            if state.clients.insert(session_id.clone(), client).is_some() {
                warn!("Session {} was already attached to room {}", session_id, code);
            }
            on_attached(&room, &state);
            drop(state);
            return room;
        }
    }

    /// Evict a room from memory without touching its durable state
    #[allow(dead_code)]
    pub async fn remove(&self, code: &str) -> Option<Arc<Room>> {
        let removed = self.rooms.write().await.live.remove(code);
        if let Some(room) = &removed {
            room.lock().await.retired = true;
            info!("Room {} removed from memory", code);
        }
        removed
    }

    /// Detach a session and tell the remaining ones. Returns whether the session was attached.
    ///
    /// Unknown rooms and sessions are a no-op, so this is safe to call from
    /// both the connection teardown and the liveness monitor.
    pub async fn leave_room(&self, code: &str, session_id: &str) -> bool {
        let Some(room) = self.get(code).await else {
            debug!("Leave for unknown room {} ignored", code);
            return false;
        };

        let now_empty = {
            let mut state = room.lock().await;
            let Some(client) = state.clients.remove(session_id) else {
                debug!("Session {} is not in room {}", session_id, code);
                return false;
            };
            let user_left = SendMessage::UserLeft(UserMessage {
                code: code.to_string(),
                user: client.user,
            });
            broadcast(&state.clients, &user_left, None);
            state.clients.is_empty()
        };
        info!("Session {} left room {}", session_id, code);

        if now_empty {
            self.discard_if_expired(code, &room).await;
        }
        true
    }

    /// Force-close and detach every session silent for longer than `timeout`.
    /// Returns the number of evicted sessions.
    pub async fn evict_stale_sessions(&self, now: Instant, timeout: Duration) -> usize {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.live.values().cloned().collect();
        let mut evicted = 0;

        for room in rooms {
            let now_empty = {
                let mut state = room.lock().await;
                let stale: Vec<String> = state
                    .clients
                    .iter()
                    .filter(|(_, c)| now.saturating_duration_since(c.last_ping) > timeout)
                    .map(|(id, _)| id.clone())
                    .collect();
                if stale.is_empty() {
                    continue;
                }

                for session_id in stale {
                    if let Some(client) = state.clients.remove(&session_id) {
                        client.force_close();
                        warn!("Session {} timed out in room {}", session_id, room.code);
                        let user_left = SendMessage::UserLeft(UserMessage {
                            code: room.code.clone(),
                            user: client.user,
                        });
                        broadcast(&state.clients, &user_left, None);
                        evicted += 1;
                    }
                }
                state.clients.is_empty()
            };

            if now_empty {
                self.discard_if_expired(&room.code, &room).await;
            }
        }
        evicted
    }

    /// Disconnect every session of a room, drop it from memory and erase its durable state.
    pub async fn purge(&self, code: &str) -> Result<PurgeOutcome, StoreError> {
        let Some(retirement) = self.retire(code, Retire::Force).await else {
            return Ok(PurgeOutcome::default());
        };
        let outcome = PurgeOutcome {
            resident: retirement.room.is_some(),
            disconnected: retirement.disconnected,
        };

        let result = self.delete_retired(retirement).await;

        if let Some(blobs) = &self.blobs {
            if let Err(e) = blobs.delete_room(code).await {
                warn!("Could not delete files of room {}: {}", code, e);
            }
        }

        info!(
            "Room {} purged (resident: {}, disconnected: {})",
            code, outcome.resident, outcome.disconnected
        );
        result.map(|_| outcome)
    }

    /// Delete every room created before `cutoff`, in memory and in the store.
    ///
    /// Rooms that still have sessions attached are skipped; they are picked up
    /// by the eager deletion once their last session leaves.
    pub async fn sweep_expired_rooms(&self, cutoff: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let codes = self.store.list_rooms_older_than(cutoff).await?;
        let mut report = SweepReport::default();

        for code in codes {
            let Some(retirement) = self.retire(&code, Retire::IfEmpty).await else {
                warn!("Room {} is expired but still has sessions, skipping", code);
                report.skipped.push(code);
                continue;
            };
            if let Err(e) = self.delete_retired(retirement).await {
                error!("Failed to delete expired room {}: {}", code, e);
            }
            info!("Deleted room {} (older than retention threshold)", code);
            report.deleted.push(code);
        }
        Ok(report)
    }

    pub async fn stats(&self) -> RegistryStats {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.live.values().cloned().collect();
        let mut stats = RegistryStats {
            rooms: rooms.len(),
            ..Default::default()
        };
        for room in rooms {
            let state = room.lock().await;
            stats.sessions += state.clients.len();
            stats.comments += state.comments.len();
            stats.media += state.media.len();
        }
        stats
    }

    pub async fn summary(&self, code: &str) -> Option<RoomSummary> {
        let room = self.get(code).await?;
        let state = room.lock().await;
        Some(RoomSummary {
            code: room.code.clone(),
            created_at: room.created_at,
            content_length: state.content.len(),
            n_sessions: state.clients.len() as u32,
            n_comments: state.comments.len() as u32,
            n_media: state.media.len() as u32,
            users: state.users(),
        })
    }

    /// Insert an unhydrated room for `code` unless one is already resident
    async fn materialize(&self, code: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.live.get(code) {
            return room.clone();
        }
        let room = match rooms.retiring.get(code) {
            Some(prior) => Arc::new(Room::after_deletion(code, prior.clone())),
            None => Arc::new(Room::new(code)),
        };
        rooms.live.insert(code.to_string(), room.clone());
        info!("Created room {}", code);
        room
    }

    /// Load a room from the store. Failures degrade to empty parts so the room stays joinable.
    async fn load(&self, code: &str) -> RoomContents {
        let content = self.store.get_room_content(code).await.unwrap_or_else(|e| {
            error!("Error retrieving content for room {}: {}", code, e);
            String::new()
        });
        let comments = self.store.get_room_comments(code).await.unwrap_or_else(|e| {
            error!("Error retrieving comments for room {}: {}", code, e);
            Vec::new()
        });
        let media = self.store.get_room_media(code).await.unwrap_or_else(|e| {
            error!("Error retrieving media for room {}: {}", code, e);
            Vec::new()
        });
        (content, comments, media)
    }

    /// Take `code` out of the table and mark its resident room retired.
    /// Returns `None` when the room may not be retired right now.
    async fn retire(&self, code: &str, mode: Retire<'_>) -> Option<Retirement> {
        let mut rooms = self.rooms.write().await;
        let mut disconnected = 0;

        let room = match rooms.live.get(code).cloned() {
            Some(room) => {
                if let Retire::IfEmptyAndCurrent(expected) = mode {
                    if !Arc::ptr_eq(&room, expected) {
                        return None;
                    }
                }
                let mut state = room.lock().await;
                if let Retire::Force = mode {
                    for (_, client) in state.clients.drain() {
                        client.force_close();
                        disconnected += 1;
                    }
                } else if !state.clients.is_empty() {
                    return None;
                }
                state.retired = true;
                drop(state);
                rooms.live.remove(code);
                Some(room)
            }
            None if matches!(mode, Retire::IfEmptyAndCurrent(_)) => return None,
            None => None,
        };

        let (done, waiting) = watch::channel(());
        rooms.retiring.insert(code.to_string(), waiting);
        Some(Retirement {
            code: code.to_string(),
            room,
            disconnected,
            done,
        })
    }

    /// Delete the durable state of a retired code, then let a successor room hydrate
    async fn delete_retired(&self, retirement: Retirement) -> Result<(), StoreError> {
        let result = match &retirement.room {
            Some(room) => {
                // Writes already under way land before the delete; later ones see `retired`
                let _turn = room.write_turn().await;
                self.delete_durable(&retirement.code).await
            }
            None => self.delete_durable(&retirement.code).await,
        };

        let mut rooms = self.rooms.write().await;
        let own = rooms
            .retiring
            .get(&retirement.code)
            .is_some_and(|waiting| waiting.same_channel(&retirement.done.subscribe()));
        if own {
            rooms.retiring.remove(&retirement.code);
        }
        drop(rooms);
        result
    }

    /// Drop an empty room that outlived the retention threshold
    async fn discard_if_expired(&self, code: &str, room: &Arc<Room>) {
        if !room.is_older_than(self.settings.room_max_age) {
            return;
        }
        let Some(retirement) = self.retire(code, Retire::IfEmptyAndCurrent(room)).await else {
            return;
        };
        if let Err(e) = self.delete_retired(retirement).await {
            error!("Failed to delete expired room {}: {}", code, e);
        }
        info!("Room {} deleted (no sessions remaining and past retention)", code);
    }

    /// Delete text, comments and media of a room. Every part is attempted; the first error is returned.
    async fn delete_durable(&self, code: &str) -> Result<(), StoreError> {
        let mut first_error = None;
        if let Err(e) = self.store.delete_room_content(code).await {
            error!("Error deleting content of room {}: {}", code, e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.store.delete_room_comments(code).await {
            error!("Error deleting comments of room {}: {}", code, e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.store.delete_room_media(code).await {
            error!("Error deleting media of room {}: {}", code, e);
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryRoomStore;
    use crate::models::{Comment, User};
    use crate::ws::room::SessionLink;
    use crate::ws::testing::{drain, CountingStore, FailingStore};
    use chrono::Duration as ChronoDuration;

    fn registry_with(store: Arc<dyn RoomStore>, room_max_age: Duration) -> Arc<RoomRegistry> {
        Arc::new(RoomRegistry::new(
            store,
            RegistrySettings {
                room_max_age,
                ..Default::default()
            },
        ))
    }

    fn client(id: &str) -> (ClientHandle, tokio::sync::mpsc::Receiver<Arc<str>>, SessionLink) {
        let (link, rx) = SessionLink::channel(32);
        let user = User {
            id: format!("user-{}", id),
            name: id.to_string(),
            ..Default::default()
        };
        (ClientHandle::new(id.to_string(), user, link.clone()), rx, link)
    }

    #[tokio::test]
    async fn test_concurrent_first_joins_hydrate_once() {
        let store = Arc::new(CountingStore::slow(Duration::from_millis(20)));
        let registry = registry_with(store.clone(), Duration::from_secs(3600));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.get_or_create("ABC123").await }));
        }
        let mut rooms = Vec::new();
        for task in tasks {
            rooms.push(task.await.unwrap());
        }

        assert_eq!(store.hydrations(), 1);
        for room in &rooms[1..] {
            assert!(Arc::ptr_eq(&rooms[0], room));
        }
    }

    #[tokio::test]
    async fn test_hydration_failure_yields_empty_room() {
        let registry = registry_with(Arc::new(FailingStore), Duration::from_secs(3600));
        let room = registry.get_or_create("broken").await;
        let state = room.lock().await;
        assert_eq!(state.content, "");
        assert!(state.comments.is_empty());
        assert!(state.media.is_empty());
    }

    #[tokio::test]
    async fn test_hydration_reads_store() {
        let store = Arc::new(MemoryRoomStore::new());
        store.save_room_content("r", "persisted").await.unwrap();
        store
            .save_comment("r", &Comment { id: "c1".to_string(), ..Default::default() })
            .await
            .unwrap();
        let registry = registry_with(store, Duration::from_secs(3600));

        let room = registry.get_or_create("r").await;
        let state = room.lock().await;
        assert_eq!(state.content, "persisted");
        assert_eq!(state.comments.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_runs_callback_under_lock() {
        let registry = registry_with(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600));
        let (a, _rx, _) = client("a");
        let mut seen = 0;
        registry
            .attach("r", a, |room, state| {
                assert_eq!(room.code, "r");
                seen = state.clients.len();
            })
            .await;
        assert_eq!(seen, 1);
        assert_eq!(registry.stats().await.sessions, 1);
    }

    #[tokio::test]
    async fn test_leave_broadcasts_user_left_once() {
        let registry = registry_with(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600));
        let (a, _rx_a, _) = client("a");
        let (b, mut rx_b, _) = client("b");
        registry.attach("r", a, |_, _| {}).await;
        registry.attach("r", b, |_, _| {}).await;

        assert!(registry.leave_room("r", "a").await);
        assert!(!registry.leave_room("r", "a").await);
        assert!(!registry.leave_room("missing", "a").await);

        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "user-left");
        assert_eq!(frames[0]["user"]["id"], "user-a");
    }

    #[tokio::test]
    async fn test_last_leave_keeps_young_room() {
        let store = Arc::new(MemoryRoomStore::new());
        store.save_room_content("r", "keep").await.unwrap();
        let registry = registry_with(store.clone(), Duration::from_secs(3600));
        let (a, _rx, _) = client("a");
        registry.attach("r", a, |_, _| {}).await;

        registry.leave_room("r", "a").await;
        assert!(registry.get("r").await.is_some());
        assert_eq!(store.get_room_content("r").await.unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_last_leave_deletes_expired_room() {
        let store = Arc::new(MemoryRoomStore::new());
        store.save_room_content("r", "old").await.unwrap();
        let registry = registry_with(store.clone(), Duration::ZERO);
        let (a, _rx, _) = client("a");
        registry.attach("r", a, |_, _| {}).await;

        registry.leave_room("r", "a").await;
        assert!(registry.get("r").await.is_none());
        assert!(!store.has_room("r").await);
    }

    #[tokio::test]
    async fn test_evict_stale_sessions() {
        let registry = registry_with(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600));
        let (a, _rx_a, link_a) = client("a");
        let (b, mut rx_b, _) = client("b");
        let closer_a = link_a.closer();
        registry.attach("r", a, |_, _| {}).await;
        registry.attach("r", b, |_, _| {}).await;

        // Only "a" has been silent long enough
        {
            let room = registry.get("r").await.unwrap();
            let mut state = room.lock().await;
            state.clients.get_mut("b").unwrap().last_ping = Instant::now() + Duration::from_secs(30);
        }
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(registry.evict_stale_sessions(later, Duration::from_secs(60)).await, 1);

        tokio::time::timeout(Duration::from_secs(1), closer_a.notified()).await.unwrap();
        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "user-left");

        // The connection teardown that follows is a no-op
        assert!(!registry.leave_room("r", "a").await);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_eviction_and_leave_announce_once() {
        for _ in 0..50 {
            let registry = registry_with(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600));
            let (a, _rx_a, _) = client("a");
            let (b, mut rx_b, _) = client("b");
            registry.attach("r", a, |_, _| {}).await;
            registry.attach("r", b, |_, _| {}).await;
            {
                let room = registry.get("r").await.unwrap();
                let mut state = room.lock().await;
                state.clients.get_mut("b").unwrap().last_ping = Instant::now() + Duration::from_secs(30);
            }

            let later = Instant::now() + Duration::from_secs(61);
            let evicting = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.evict_stale_sessions(later, Duration::from_secs(60)).await })
            };
            let leaving = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.leave_room("r", "a").await })
            };
            let (evicted, left) = tokio::join!(evicting, leaving);
            assert_eq!(evicted.unwrap() + usize::from(left.unwrap()), 1);

            let frames = drain(&mut rx_b);
            let announcements = frames.iter().filter(|f| f["type"] == "user-left").count();
            assert_eq!(announcements, 1);
            assert_eq!(registry.summary("r").await.unwrap().n_sessions, 1);
        }
    }

    #[tokio::test]
    async fn test_join_after_retirement_gets_a_fresh_room() {
        let store = Arc::new(MemoryRoomStore::new());
        store.save_room_content("r", "old").await.unwrap();
        let registry = registry_with(store.clone(), Duration::ZERO);
        let stale = registry.get_or_create("r").await;

        registry.purge("r").await.unwrap();
        assert!(stale.lock().await.retired);

        let (a, _rx, _) = client("a");
        let room = registry.attach("r", a, |_, _| {}).await;
        assert!(!Arc::ptr_eq(&stale, &room));
        assert_eq!(room.lock().await.content, "");
        assert_eq!(registry.summary("r").await.unwrap().n_sessions, 1);
    }

    #[tokio::test]
    async fn test_purge_disconnects_and_erases() {
        let store = Arc::new(MemoryRoomStore::new());
        store.save_room_content("r", "secret").await.unwrap();
        let registry = registry_with(store.clone(), Duration::from_secs(3600));
        let (a, _rx, link) = client("a");
        let closer = link.closer();
        registry.attach("r", a, |_, _| {}).await;

        let outcome = registry.purge("r").await.unwrap();
        assert_eq!(outcome, PurgeOutcome { resident: true, disconnected: 1 });
        tokio::time::timeout(Duration::from_secs(1), closer.notified()).await.unwrap();
        assert!(registry.get("r").await.is_none());
        assert!(!store.has_room("r").await);

        let fresh = registry.get_or_create("r").await;
        assert_eq!(fresh.lock().await.content, "");
    }

    #[tokio::test]
    async fn test_purge_reports_store_failure() {
        let registry = registry_with(Arc::new(FailingStore), Duration::from_secs(3600));
        assert!(registry.purge("r").await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_skips_occupied_rooms() {
        let store = Arc::new(MemoryRoomStore::new());
        let old = Utc::now() - ChronoDuration::hours(48);
        store.set_created_at("busy", old).await;
        store.set_created_at("idle", old).await;
        store.set_created_at("cold", old).await;
        store.save_room_content("fresh", "new").await.unwrap();

        let registry = registry_with(store.clone(), Duration::from_secs(3600));
        let (a, _rx, _) = client("a");
        registry.attach("busy", a, |_, _| {}).await;
        registry.get_or_create("idle").await;

        let cutoff = Utc::now() - ChronoDuration::hours(24);
        let mut report = registry.sweep_expired_rooms(cutoff).await.unwrap();
        report.deleted.sort();
        assert_eq!(report.deleted, vec!["cold".to_string(), "idle".to_string()]);
        assert_eq!(report.skipped, vec!["busy".to_string()]);

        assert!(registry.get("busy").await.is_some());
        assert!(registry.get("idle").await.is_none());
        assert!(store.has_room("busy").await);
        assert!(store.has_room("fresh").await);
        assert!(!store.has_room("cold").await);
    }

    #[tokio::test]
    async fn test_summary_and_stats() {
        let registry = registry_with(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600));
        assert!(registry.summary("r").await.is_none());

        let (a, _rx, _) = client("a");
        registry.attach("r", a, |_, _| {}).await;
        registry.get_or_create("other").await;

        let summary = registry.summary("r").await.unwrap();
        assert_eq!(summary.n_sessions, 1);
        assert_eq!(summary.users[0].name, "a");

        let stats = registry.stats().await;
        assert_eq!(stats.rooms, 2);
        assert_eq!(stats.sessions, 1);

        assert!(registry.remove("other").await.is_some());
        assert_eq!(registry.stats().await.rooms, 1);
    }
}
