//! SQLite-backed library store.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::LibraryStore;
use crate::Result;
use crate::domain::{Artist, HistoryEntry, MediaRecord};

const DEFAULT_POOL_SIZE: u32 = 4;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        uploader TEXT,
        creator TEXT,
        description TEXT,
        duration REAL,
        upload_date TEXT,
        original_url TEXT NOT NULL,
        file_path TEXT NOT NULL,
        cover_path TEXT,
        subtitle_path TEXT,
        has_embedded_subs INTEGER NOT NULL DEFAULT 0,
        media_type TEXT NOT NULL,
        downloaded_at TEXT NOT NULL,
        is_favorite INTEGER NOT NULL DEFAULT 0,
        source TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        cover_path TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS video_artists (
        video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
        PRIMARY KEY (video_id, artist_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS playlist_videos (
        playlist_id INTEGER NOT NULL,
        video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        added_at TEXT NOT NULL,
        PRIMARY KEY (playlist_id, video_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        media_type TEXT NOT NULL,
        thumbnail TEXT,
        status TEXT NOT NULL,
        error TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_url ON history(url)",
];

/// Open a connection pool for `database_url`.
///
/// In-memory databases get a single connection, since every connection would
/// otherwise see its own empty database.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let mut connect_options = SqliteConnectOptions::from_str(database_url)?
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { DEFAULT_POOL_SIZE })
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    tracing::info!(in_memory, "Library database pool initialized");
    Ok(pool)
}

/// Library store on a SQLite database.
#[derive(Clone)]
pub struct SqliteLibraryStore {
    pool: SqlitePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and create missing tables.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let store = Self::new(init_pool(database_url).await?);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the tables this store writes to if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn video_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Names of the artists linked to a video, ordered by artist id.
    pub async fn artist_names_for(&self, video_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT a.name FROM artists a
            JOIN video_artists va ON va.artist_id = a.id
            WHERE va.video_id = ?
            ORDER BY a.id
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Video ids of a playlist in position order.
    pub async fn playlist(&self, playlist_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT video_id FROM playlist_videos WHERE playlist_id = ? ORDER BY position",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// `(status, error)` rows recorded for a url, oldest first.
    pub async fn history_for(&self, url: &str) -> Result<Vec<(String, Option<String>)>> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT status, error FROM history WHERE url = ? ORDER BY id")
                .bind(url)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn upsert_video(&self, record: &MediaRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO videos (
                id, title, uploader, creator, description, duration, upload_date,
                original_url, file_path, cover_path, subtitle_path, has_embedded_subs,
                media_type, downloaded_at, is_favorite, source
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                uploader = excluded.uploader,
                creator = excluded.creator,
                description = excluded.description,
                duration = excluded.duration,
                upload_date = excluded.upload_date,
                original_url = excluded.original_url,
                file_path = excluded.file_path,
                cover_path = excluded.cover_path,
                subtitle_path = excluded.subtitle_path,
                has_embedded_subs = excluded.has_embedded_subs,
                media_type = excluded.media_type,
                downloaded_at = excluded.downloaded_at,
                source = excluded.source
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.uploader)
        .bind(&record.creator)
        .bind(&record.description)
        .bind(record.duration)
        .bind(&record.upload_date)
        .bind(&record.original_url)
        .bind(&record.file_path)
        .bind(&record.cover_path)
        .bind(&record.subtitle_path)
        .bind(record.has_embedded_subs)
        .bind(record.media_type.as_str())
        .bind(record.downloaded_at.to_rfc3339())
        .bind(record.is_favorite)
        .bind(&record.source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_or_create_artist(&self, name: &str, cover_hint: Option<&str>) -> Result<Artist> {
        sqlx::query(
            r#"
            INSERT INTO artists (name, cover_path) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET
                cover_path = COALESCE(artists.cover_path, excluded.cover_path)
            "#,
        )
        .bind(name)
        .bind(cover_hint)
        .execute(&self.pool)
        .await?;

        let (id, name, cover_path): (i64, String, Option<String>) =
            sqlx::query_as("SELECT id, name, cover_path FROM artists WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(Artist {
            id,
            name,
            cover_path,
        })
    }

    async fn link_video_artist(&self, video_id: &str, artist_id: i64) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO video_artists (video_id, artist_id) VALUES (?, ?)")
            .bind(video_id)
            .bind(artist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_video_to_playlist(&self, playlist_id: i64, video_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position, added_at)
            VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM playlist_videos WHERE playlist_id = ?),
                ?
            )
            "#,
        )
        .bind(playlist_id)
        .bind(video_id)
        .bind(playlist_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_history_entry(&self, entry: &HistoryEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM history WHERE url = ?")
            .bind(&entry.url)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO history (url, title, media_type, thumbnail, status, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.url)
        .bind(&entry.title)
        .bind(entry.media_type.as_str())
        .bind(&entry.thumbnail)
        .bind(entry.status.as_str())
        .bind(&entry.error)
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
