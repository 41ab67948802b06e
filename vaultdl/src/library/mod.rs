//! Media library persistence.
//!
//! The pipeline registers finished downloads through [`LibraryStore`]. Two
//! implementations ship with the crate: an in-memory store for tests and dry
//! runs, and a SQLite store backed by sqlx.

mod memory;
mod sqlite;

pub use memory::MemoryLibraryStore;
pub use sqlite::{SqliteLibraryStore, init_pool};

use async_trait::async_trait;

use crate::Result;
use crate::domain::{Artist, HistoryEntry, MediaRecord};

/// Operations the pipeline needs from the media library.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Insert or replace a media record keyed by its id. Favorites survive.
    async fn upsert_video(&self, record: &MediaRecord) -> Result<()>;

    /// Look an artist up by name (case-insensitive), creating it when absent.
    ///
    /// `cover_hint` fills in the artist's cover only if it has none yet.
    async fn find_or_create_artist(&self, name: &str, cover_hint: Option<&str>) -> Result<Artist>;

    /// Idempotent.
    async fn link_video_artist(&self, video_id: &str, artist_id: i64) -> Result<()>;

    /// Append to the end of a playlist. Idempotent.
    async fn add_video_to_playlist(&self, playlist_id: i64, video_id: &str) -> Result<()>;

    /// Record an outcome, replacing earlier entries for the same url.
    async fn add_history_entry(&self, entry: &HistoryEntry) -> Result<()>;
}
