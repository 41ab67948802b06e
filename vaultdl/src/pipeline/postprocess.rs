//! Turns a finished download into registered library entities.
//!
//! Steps after the upsert are not transactional; a failure mid-way leaves
//! the record registered with partial artist or playlist links.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::artists::{normalize_artists, split_artists};
use super::files::{extension_of, find_artifacts, preferred_subtitle};
use super::metadata::MediaInfo;
use crate::config::LibraryPaths;
use crate::domain::{HistoryEntry, Job, MediaRecord};
use crate::library::LibraryStore;
use crate::utils::fs::{move_file, remove_file_if_exists};
use crate::{Error, Result};

/// Post-download pipeline for one library.
pub struct PostProcessor {
    store: Arc<dyn LibraryStore>,
    paths: LibraryPaths,
}

impl PostProcessor {
    pub fn new(store: Arc<dyn LibraryStore>, paths: LibraryPaths) -> Self {
        Self { store, paths }
    }

    pub fn paths(&self) -> &LibraryPaths {
        &self.paths
    }

    /// Register the output of `job`. Notes for non-fatal problems are
    /// appended to `log`.
    ///
    /// `subtitle_langs` ranks subtitle tracks; the best match is kept and
    /// the other tracks are deleted.
    pub async fn process(
        &self,
        job: &Job,
        subtitle_langs: &str,
        log: &mut String,
    ) -> Result<MediaRecord> {
        let id = job.id();
        let media_dir = &self.paths.media_dir;
        let artifacts = find_artifacts(media_dir, id).await?;

        let metadata_path = artifacts
            .metadata
            .ok_or_else(|| Error::MetadataNotFound(id.to_string()))?;
        let raw = tokio::fs::read_to_string(&metadata_path)
            .await
            .map_err(|e| Error::io_path("reading metadata", &metadata_path, e))?;
        let info = MediaInfo::from_json(&raw)?;
        if let Err(e) = remove_file_if_exists("removing metadata", &metadata_path).await {
            warn!(job_id = %id, error = %e, "Failed to remove metadata sidecar");
        }

        let media_path = artifacts
            .media
            .ok_or_else(|| Error::MediaNotFound(id.to_string()))?;

        let cover_path = match &artifacts.thumbnail {
            Some(thumb) => {
                self.relocate(thumb, &self.paths.covers_dir, id, "moving thumbnail", log)
                    .await
            }
            None => None,
        };

        let chosen = preferred_subtitle(&artifacts.subtitles, id, subtitle_langs);
        let subtitle_path = match chosen {
            Some(idx) => {
                let sub = &artifacts.subtitles[idx];
                self.relocate(sub, &self.paths.subtitles_dir, id, "moving subtitle", log)
                    .await
            }
            None => None,
        };
        for (_, extra) in artifacts
            .subtitles
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != chosen)
        {
            if let Err(e) = remove_file_if_exists("removing extra subtitle", extra).await {
                warn!(job_id = %id, error = %e, "Failed to remove extra subtitle");
            }
        }

        if let Some(description) = &artifacts.description
            && let Err(e) = remove_file_if_exists("removing description", description).await
        {
            warn!(job_id = %id, error = %e, "Failed to remove description sidecar");
        }

        let raw_artist = info.artist_string().map(str::to_string);
        let artists = match info.artist_list() {
            Some(list) => normalize_artists(list),
            None => split_artists(raw_artist.as_deref()),
        };
        let creator = raw_artist.or_else(|| info.artist_list().map(|list| list.join(", ")));

        let video = &job.video_info;
        let record = MediaRecord {
            id: id.to_string(),
            title: info
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| video.title.clone()),
            uploader: info
                .uploader()
                .map(str::to_string)
                .or_else(|| video.uploader.clone()),
            creator,
            description: info.description.clone(),
            duration: info.duration.or(video.duration),
            upload_date: info.upload_date_iso(),
            original_url: video.url.clone(),
            file_path: media_path.to_string_lossy().into_owned(),
            has_embedded_subs: subtitle_path.is_some(),
            cover_path,
            subtitle_path,
            media_type: job.download_type,
            downloaded_at: Utc::now(),
            is_favorite: false,
            source: info.source(&video.url),
        };

        self.store.upsert_video(&record).await?;

        let cover_hint = record
            .cover_path
            .clone()
            .or_else(|| info.thumbnail.clone())
            .or_else(|| video.thumbnail.clone());
        for name in &artists {
            let artist = self
                .store
                .find_or_create_artist(name, cover_hint.as_deref())
                .await?;
            self.store.link_video_artist(&record.id, artist.id).await?;
        }

        if let Some(playlist_id) = job.playlist_id {
            self.store
                .add_video_to_playlist(playlist_id, &record.id)
                .await?;
        }

        let thumbnail = video.thumbnail.clone().or_else(|| info.thumbnail.clone());
        self.store
            .add_history_entry(&HistoryEntry::success(&record, thumbnail))
            .await?;

        info!(
            job_id = %id,
            file = %record.file_path,
            artists = ?artists,
            "Registered download in library"
        );
        Ok(record)
    }

    /// Move an artifact to `<dir>/<id>.<ext>`; failures are logged, not fatal.
    async fn relocate(
        &self,
        from: &Path,
        dir: &Path,
        id: &str,
        op: &'static str,
        log: &mut String,
    ) -> Option<String> {
        let ext = extension_of(from)?;
        let to = dir.join(format!("{id}.{ext}"));
        match move_file(op, from, &to).await {
            Ok(()) => {
                debug!(job_id = %id, from = %from.display(), to = %to.display(), "Moved artifact");
                Some(to.to_string_lossy().into_owned())
            }
            Err(e) => {
                warn!(job_id = %id, error = %e, "Failed to relocate artifact");
                log.push_str(&format!("\n[pipeline] {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SUBTITLE_LANGS;
    use crate::domain::{DownloadType, HistoryStatus, VideoInfo};
    use crate::library::MemoryLibraryStore;

    struct Fixture {
        _root: tempfile::TempDir,
        paths: LibraryPaths,
        store: Arc<MemoryLibraryStore>,
        processor: PostProcessor,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::under(root.path());
        std::fs::create_dir_all(&paths.media_dir).unwrap();
        let store = Arc::new(MemoryLibraryStore::new());
        let processor = PostProcessor::new(store.clone(), paths.clone());
        Fixture {
            _root: root,
            paths,
            store,
            processor,
        }
    }

    fn job(id: &str) -> Job {
        Job::video(VideoInfo {
            id: id.to_string(),
            title: "Fallback title".to_string(),
            uploader: None,
            url: format!("https://www.youtube.com/watch?v={id}"),
            thumbnail: Some("https://img/thumb.jpg".to_string()),
            duration: Some(10.0),
        })
    }

    async fn write(dir: &Path, name: &str, contents: &str) {
        tokio::fs::write(dir.join(name), contents).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_registration() {
        let f = fixture();
        let media = &f.paths.media_dir;
        write(
            media,
            "abc.info.json",
            r#"{"id":"abc","title":"Song","artist":"Tyler, The Creator; Earth, Wind & Fire",
                "upload_date":"20230405","extractor_key":"Youtube","duration":180.5}"#,
        )
        .await;
        write(media, "abc.mp4", "video").await;
        write(media, "abc.jpg", "img").await;
        write(media, "abc.en.srt", "1\n").await;
        write(media, "abc.description", "desc").await;

        let job = job("abc").with_playlist(7);
        let mut log = String::new();
        let record = f
            .processor
            .process(&job, DEFAULT_SUBTITLE_LANGS, &mut log)
            .await
            .unwrap();

        assert_eq!(record.title, "Song");
        assert_eq!(record.upload_date.as_deref(), Some("2023-04-05"));
        assert_eq!(record.duration, Some(180.5));
        assert_eq!(record.source, "youtube");
        assert_eq!(record.media_type, DownloadType::Video);
        assert!(record.has_embedded_subs);
        assert!(!record.is_favorite);
        assert_eq!(
            record.cover_path,
            Some(f.paths.covers_dir.join("abc.jpg").to_string_lossy().into_owned())
        );
        assert_eq!(
            record.subtitle_path,
            Some(f.paths.subtitles_dir.join("abc.srt").to_string_lossy().into_owned())
        );

        assert!(!media.join("abc.info.json").exists());
        assert!(!media.join("abc.description").exists());
        assert!(media.join("abc.mp4").exists());
        assert!(f.paths.covers_dir.join("abc.jpg").exists());

        assert_eq!(f.store.video("abc"), Some(record.clone()));
        assert_eq!(
            f.store.artist_names_for("abc"),
            vec!["Tyler, The Creator", "Earth, Wind & Fire"]
        );
        assert_eq!(f.store.playlist(7), vec!["abc"]);
        let history = f.store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, HistoryStatus::Success);
        assert_eq!(history[0].thumbnail.as_deref(), Some("https://img/thumb.jpg"));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_preferred_subtitle_kept_and_others_removed() {
        let f = fixture();
        let media = &f.paths.media_dir;
        write(media, "abc.info.json", r#"{"id":"abc","title":"Clip"}"#).await;
        write(media, "abc.mp4", "video").await;
        for lang in ["de", "en", "fr"] {
            write(media, &format!("abc.{lang}.srt"), lang).await;
        }

        let record = f
            .processor
            .process(&job("abc").with_subtitles(true), "en.*", &mut String::new())
            .await
            .unwrap();

        let kept = f.paths.subtitles_dir.join("abc.srt");
        assert_eq!(record.subtitle_path, Some(kept.to_string_lossy().into_owned()));
        assert_eq!(tokio::fs::read_to_string(&kept).await.unwrap(), "en");
        assert!(record.has_embedded_subs);

        let mut left: Vec<String> = std::fs::read_dir(media)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["abc.mp4"]);
    }

    #[tokio::test]
    async fn test_missing_metadata_skips_registration() {
        let f = fixture();
        write(&f.paths.media_dir, "abc.mp4", "video").await;

        let err = f
            .processor
            .process(&job("abc"), DEFAULT_SUBTITLE_LANGS, &mut String::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MetadataNotFound(ref id) if id == "abc"));
        assert_eq!(f.store.video_count(), 0);
        assert!(f.store.history().is_empty());
    }

    #[tokio::test]
    async fn test_missing_media_file() {
        let f = fixture();
        write(&f.paths.media_dir, "abc.info.json", r#"{"id":"abc"}"#).await;
        write(&f.paths.media_dir, "abc.mp4.part", "partial").await;

        let err = f
            .processor
            .process(&job("abc"), DEFAULT_SUBTITLE_LANGS, &mut String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MediaNotFound(_)));
        assert_eq!(f.store.video_count(), 0);
    }

    #[tokio::test]
    async fn test_fallbacks_without_rich_metadata() {
        let f = fixture();
        write(&f.paths.media_dir, "xyz.info.json", r#"{"uploader":"Band - Topic"}"#).await;
        write(&f.paths.media_dir, "xyz.m4a", "audio").await;

        let job = Job::audio(job("xyz").video_info);
        let record = f
            .processor
            .process(&job, DEFAULT_SUBTITLE_LANGS, &mut String::new())
            .await
            .unwrap();

        assert_eq!(record.title, "Fallback title");
        assert_eq!(record.duration, Some(10.0));
        assert_eq!(record.media_type, DownloadType::Audio);
        assert!(record.cover_path.is_none());
        assert!(!record.has_embedded_subs);
        assert_eq!(record.creator.as_deref(), Some("Band - Topic"));
        assert_eq!(f.store.artist_names_for("xyz"), vec!["Band"]);
        // No local cover, so the artist falls back to the remote thumbnail.
        assert_eq!(
            f.store.artists()[0].cover_path.as_deref(),
            Some("https://img/thumb.jpg")
        );
    }

    #[tokio::test]
    async fn test_explicit_artist_list_wins() {
        let f = fixture();
        write(
            &f.paths.media_dir,
            "a1.info.json",
            r#"{"artist":"Ignored, Names","artists":["One","Two"]}"#,
        )
        .await;
        write(&f.paths.media_dir, "a1.mp3", "audio").await;

        f.processor
            .process(&job("a1"), DEFAULT_SUBTITLE_LANGS, &mut String::new())
            .await
            .unwrap();
        assert_eq!(f.store.artist_names_for("a1"), vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let root = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::under(root.path());
        std::fs::create_dir_all(&paths.media_dir).unwrap();
        let processor =
            PostProcessor::new(Arc::new(MemoryLibraryStore::failing_upserts()), paths.clone());
        write(&paths.media_dir, "abc.info.json", "{}").await;
        write(&paths.media_dir, "abc.mp4", "v").await;

        let result = processor
            .process(&job("abc"), DEFAULT_SUBTITLE_LANGS, &mut String::new())
            .await;
        assert!(result.is_err());
    }
}
