//! In-memory library store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::LibraryStore;
use crate::domain::{Artist, HistoryEntry, MediaRecord};
use crate::{Error, Result};

#[derive(Default)]
struct State {
    videos: BTreeMap<String, MediaRecord>,
    artists: Vec<Artist>,
    video_artists: BTreeSet<(String, i64)>,
    playlists: BTreeMap<i64, Vec<String>>,
    history: Vec<HistoryEntry>,
}

/// Library store kept entirely in memory.
#[derive(Default)]
pub struct MemoryLibraryStore {
    state: Mutex<State>,
    fail_upserts: bool,
}

impl MemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `upsert_video` always fails.
    pub fn failing_upserts() -> Self {
        Self {
            fail_upserts: true,
            ..Self::default()
        }
    }

    pub fn video(&self, id: &str) -> Option<MediaRecord> {
        self.state.lock().videos.get(id).cloned()
    }

    pub fn video_count(&self) -> usize {
        self.state.lock().videos.len()
    }

    pub fn artists(&self) -> Vec<Artist> {
        self.state.lock().artists.clone()
    }

    /// Names of the artists linked to a video, ordered by artist id.
    pub fn artist_names_for(&self, video_id: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .video_artists
            .iter()
            .filter(|(vid, _)| vid == video_id)
            .filter_map(|(_, aid)| state.artists.iter().find(|a| a.id == *aid))
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn playlist(&self, playlist_id: i64) -> Vec<String> {
        self.state
            .lock()
            .playlists
            .get(&playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.clone()
    }
}

#[async_trait]
impl LibraryStore for MemoryLibraryStore {
    async fn upsert_video(&self, record: &MediaRecord) -> Result<()> {
        if self.fail_upserts {
            return Err(Error::Other("library store unavailable".to_string()));
        }
        let mut state = self.state.lock();
        let mut record = record.clone();
        if let Some(existing) = state.videos.get(&record.id) {
            record.is_favorite = existing.is_favorite;
        }
        state.videos.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_or_create_artist(&self, name: &str, cover_hint: Option<&str>) -> Result<Artist> {
        let mut state = self.state.lock();
        if let Some(artist) = state
            .artists
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            if artist.cover_path.is_none() {
                artist.cover_path = cover_hint.map(str::to_string);
            }
            return Ok(artist.clone());
        }

        let artist = Artist {
            id: state.artists.len() as i64 + 1,
            name: name.to_string(),
            cover_path: cover_hint.map(str::to_string),
        };
        state.artists.push(artist.clone());
        Ok(artist)
    }

    async fn link_video_artist(&self, video_id: &str, artist_id: i64) -> Result<()> {
        self.state
            .lock()
            .video_artists
            .insert((video_id.to_string(), artist_id));
        Ok(())
    }

    async fn add_video_to_playlist(&self, playlist_id: i64, video_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let entries = state.playlists.entry(playlist_id).or_default();
        if !entries.iter().any(|v| v == video_id) {
            entries.push(video_id.to_string());
        }
        Ok(())
    }

    async fn add_history_entry(&self, entry: &HistoryEntry) -> Result<()> {
        let mut state = self.state.lock();
        state.history.retain(|h| h.url != entry.url);
        state.history.push(entry.clone());
        Ok(())
    }
}
