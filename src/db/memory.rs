use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RoomStore, StoreError};
use crate::models::{Comment, MediaFile};

#[derive(Debug, Clone)]
struct StoredRoom {
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<String, StoredRoom>,
    /// (room code, comment)
    comments: Vec<(String, Comment)>,
    /// (room code, media)
    media: Vec<(String, MediaFile)>,
}

/// Process-local room store used when no database is configured.
#[derive(Default)]
pub struct MemoryRoomStore {
    tables: RwLock<Tables>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the creation time of a stored room
    #[cfg(test)]
    pub async fn set_created_at(&self, code: &str, created_at: DateTime<Utc>) {
        let mut tables = self.tables.write().await;
        tables
            .rooms
            .entry(code.to_string())
            .or_insert_with(|| StoredRoom { content: String::new(), created_at })
            .created_at = created_at;
    }

    #[cfg(test)]
    pub async fn has_room(&self, code: &str) -> bool {
        self.tables.read().await.rooms.contains_key(code)
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_room_content(&self, code: &str) -> Result<String, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.get(code).map(|r| r.content.clone()).unwrap_or_default())
    }

    async fn save_room_content(&self, code: &str, content: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .rooms
            .entry(code.to_string())
            .and_modify(|r| r.content = content.to_string())
            .or_insert_with(|| StoredRoom { content: content.to_string(), created_at: Utc::now() });
        Ok(())
    }

    async fn delete_room_content(&self, code: &str) -> Result<(), StoreError> {
        self.tables.write().await.rooms.remove(code);
        Ok(())
    }

    async fn get_room_comments(&self, code: &str) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|(room, _)| room == code)
            .map(|(_, c)| c.clone())
            .collect();
        comments.sort_by_key(|c| c.timestamp);
        Ok(comments)
    }

    async fn save_comment(&self, code: &str, comment: &Comment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.comments.iter().any(|(_, c)| c.id == comment.id) {
            return Err(StoreError::Unavailable(format!("duplicate comment id {}", comment.id)));
        }
        tables.comments.push((code.to_string(), comment.clone()));
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> Result<(), StoreError> {
        self.tables.write().await.comments.retain(|(_, c)| c.id != id);
        Ok(())
    }

    async fn delete_room_comments(&self, code: &str) -> Result<(), StoreError> {
        self.tables.write().await.comments.retain(|(room, _)| room != code);
        Ok(())
    }

    async fn get_room_media(&self, code: &str) -> Result<Vec<MediaFile>, StoreError> {
        let tables = self.tables.read().await;
        let mut media: Vec<MediaFile> = tables
            .media
            .iter()
            .filter(|(room, _)| room == code)
            .map(|(_, m)| m.clone())
            .collect();
        media.sort_by_key(|m| m.uploaded_at);
        Ok(media)
    }

    async fn save_media_file(&self, code: &str, media: &MediaFile) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.media.iter().any(|(_, m)| m.id == media.id) {
            return Err(StoreError::Unavailable(format!("duplicate media id {}", media.id)));
        }
        tables.media.push((code.to_string(), media.clone()));
        Ok(())
    }

    async fn delete_media_file(&self, id: &str) -> Result<(), StoreError> {
        self.tables.write().await.media.retain(|(_, m)| m.id != id);
        Ok(())
    }

    async fn delete_room_media(&self, code: &str) -> Result<(), StoreError> {
        self.tables.write().await.media.retain(|(room, _)| room != code);
        Ok(())
    }

    async fn list_rooms_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rooms
            .iter()
            .filter(|(_, r)| r.created_at < cutoff)
            .map(|(code, _)| code.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn comment(id: &str, secs: i64) -> Comment {
        Comment {
            id: id.to_string(),
            content: format!("comment {}", id),
            timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_room_has_empty_content() {
        let store = MemoryRoomStore::new();
        assert_eq!(store.get_room_content("nope").await.unwrap(), "");
        assert!(store.get_room_comments("nope").await.unwrap().is_empty());
        assert!(store.get_room_media("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_content_keeps_creation_time() {
        let store = MemoryRoomStore::new();
        let old = Utc::now() - Duration::hours(48);
        store.set_created_at("r", old).await;

        store.save_room_content("r", "hello").await.unwrap();
        assert_eq!(store.get_room_content("r").await.unwrap(), "hello");

        let stale = store.list_rooms_older_than(Utc::now() - Duration::hours(24)).await.unwrap();
        assert_eq!(stale, vec!["r".to_string()]);
    }

    #[tokio::test]
    async fn test_comments_are_ordered_by_timestamp_and_scoped_to_room() {
        let store = MemoryRoomStore::new();
        store.save_comment("r", &comment("late", 200)).await.unwrap();
        store.save_comment("r", &comment("early", 100)).await.unwrap();
        store.save_comment("other", &comment("elsewhere", 50)).await.unwrap();

        let ids: Vec<String> = store
            .get_room_comments("r")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["early".to_string(), "late".to_string()]);

        store.delete_room_comments("r").await.unwrap();
        assert!(store.get_room_comments("r").await.unwrap().is_empty());
        assert_eq!(store.get_room_comments("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_rejected() {
        let store = MemoryRoomStore::new();
        store.save_comment("r", &comment("c", 1)).await.unwrap();
        assert!(store.save_comment("r", &comment("c", 2)).await.is_err());

        let media = MediaFile { id: "m".to_string(), ..Default::default() };
        store.save_media_file("r", &media).await.unwrap();
        assert!(store.save_media_file("r", &media).await.is_err());
        store.delete_media_file("m").await.unwrap();
        assert!(store.get_room_media("r").await.unwrap().is_empty());
    }
}
