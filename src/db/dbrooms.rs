use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{error, info};

use super::util::log_pool_state;
use super::{RoomStore, StoreError};
use crate::models::{Comment, MediaFile};

/// Comment row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct CommentRow {
    id: String,
    line_number: Option<i64>,
    line_range: Option<String>,
    author: String,
    author_id: String,
    content: String,
    timestamp: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            line_number: row.line_number,
            line_range: row.line_range,
            author: row.author,
            author_id: row.author_id,
            content: row.content,
            timestamp: row.timestamp,
        }
    }
}

/// Media file row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct MediaRow {
    id: String,
    name: String,
    #[sqlx(rename = "type")]
    mime_type: String,
    size: i64,
    url: String,
    uploaded_at: DateTime<Utc>,
    uploaded_by: String,
}

impl From<MediaRow> for MediaFile {
    fn from(row: MediaRow) -> Self {
        MediaFile {
            id: row.id,
            name: row.name,
            mime_type: row.mime_type,
            size: row.size,
            url: row.url,
            uploaded_at: row.uploaded_at,
            uploaded_by: row.uploaded_by,
        }
    }
}

/// Postgres backed room store
pub struct DbRooms {
    pool: PgPool,
}

impl DbRooms {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }
}

#[async_trait]
impl RoomStore for DbRooms {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                code TEXT PRIMARY KEY,
                content TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                room_code TEXT NOT NULL,
                line_number BIGINT,
                line_range TEXT,
                author TEXT NOT NULL,
                author_id TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                room_code TEXT NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                size BIGINT NOT NULL,
                url TEXT NOT NULL,
                uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                uploaded_by TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS comments_room_code_idx ON comments (room_code)",
            "CREATE INDEX IF NOT EXISTS media_files_room_code_idx ON media_files (room_code)",
        ];

        for statement in statements {
            if let Err(e) = sqlx::query(statement).execute(&self.pool).await {
                error!("Failed to create schema: {}", e);
                return Err(e.into());
            }
        }
        info!("Database schema ready");
        Ok(())
    }

    async fn get_room_content(&self, code: &str) -> Result<String, StoreError> {
        log_pool_state(&self.pool, "Loading content", code);

        let row = sqlx::query("SELECT content FROM rooms WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("content")?),
            None => Ok(String::new()),
        }
    }

    async fn save_room_content(&self, code: &str, content: &str) -> Result<(), StoreError> {
        log_pool_state(&self.pool, "Saving content", code);

        // The upsert leaves created_at untouched so retention counts from the first save.
        let query_sql = r#"
            INSERT INTO rooms (code, content)
            VALUES ($1, $2)
            ON CONFLICT (code) DO UPDATE SET content = EXCLUDED.content;
        "#;
        sqlx::query(query_sql)
            .bind(code)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_room_content(&self, code: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM rooms WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_room_comments(&self, code: &str) -> Result<Vec<Comment>, StoreError> {
        log_pool_state(&self.pool, "Loading comments", code);

        let query_sql = r#"
            SELECT id, line_number, line_range, author, author_id, content, timestamp
            FROM comments
            WHERE room_code = $1
            ORDER BY timestamp ASC;
        "#;
        let rows = sqlx::query_as::<_, CommentRow>(query_sql)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn save_comment(&self, code: &str, comment: &Comment) -> Result<(), StoreError> {
        let query_sql = r#"
            INSERT INTO comments (id, room_code, line_number, line_range, author, author_id, content, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#;
        sqlx::query(query_sql)
            .bind(&comment.id)
            .bind(code)
            .bind(comment.line_number)
            .bind(&comment.line_range)
            .bind(&comment.author)
            .bind(&comment.author_id)
            .bind(&comment.content)
            .bind(comment.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_room_comments(&self, code: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM comments WHERE room_code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_room_media(&self, code: &str) -> Result<Vec<MediaFile>, StoreError> {
        log_pool_state(&self.pool, "Loading media", code);

        let query_sql = r#"
            SELECT id, name, type, size, url, uploaded_at, uploaded_by
            FROM media_files
            WHERE room_code = $1
            ORDER BY uploaded_at ASC;
        "#;
        let rows = sqlx::query_as::<_, MediaRow>(query_sql)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MediaFile::from).collect())
    }

    async fn save_media_file(&self, code: &str, media: &MediaFile) -> Result<(), StoreError> {
        let query_sql = r#"
            INSERT INTO media_files (id, room_code, name, type, size, url, uploaded_at, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#;
        sqlx::query(query_sql)
            .bind(&media.id)
            .bind(code)
            .bind(&media.name)
            .bind(&media.mime_type)
            .bind(media.size)
            .bind(&media.url)
            .bind(media.uploaded_at)
            .bind(&media.uploaded_by)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_media_file(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM media_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_room_media(&self, code: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM media_files WHERE room_code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_rooms_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT code FROM rooms WHERE created_at < $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        let mut codes = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<String, _>("code") {
                Ok(code) => codes.push(code),
                Err(e) => error!("Failed to read room code: {}", e),
            }
        }
        Ok(codes)
    }
}
