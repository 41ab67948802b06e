//! Process-level configuration loaded from the environment.
//!
//! `.env` files are honoured through `dotenvy`; explicit environment variables
//! win over `.env` entries.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default stall interval for the downloader process.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(120);

const DEFAULT_DOWNLOADER: &str = "yt-dlp";

/// Filesystem layout of the media library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    /// Where the downloader writes and where media files stay.
    pub media_dir: PathBuf,
    pub covers_dir: PathBuf,
    pub subtitles_dir: PathBuf,
}

impl LibraryPaths {
    /// Lay out `media/`, `covers/` and `subtitles/` under one root.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            media_dir: root.join("media"),
            covers_dir: root.join("covers"),
            subtitles_dir: root.join("subtitles"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub library: LibraryPaths,
    pub database_url: String,
    pub log_dir: PathBuf,
    /// Downloader binary (name on `PATH` or explicit path).
    pub downloader_path: String,
    /// Explicit transcoder location, if configured.
    pub ffmpeg_path: Option<PathBuf>,
    pub stall_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = get("VAULTDL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let defaults = LibraryPaths::under(&root);

        let library = LibraryPaths {
            media_dir: get("VAULTDL_MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_dir),
            covers_dir: get("VAULTDL_COVERS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.covers_dir),
            subtitles_dir: get("VAULTDL_SUBTITLES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.subtitles_dir),
        };

        let stall_timeout = match get("VAULTDL_STALL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::config(format!("VAULTDL_STALL_TIMEOUT_SECS is not a number: {raw}"))
                })?;
                if secs == 0 {
                    return Err(Error::config("VAULTDL_STALL_TIMEOUT_SECS must be positive"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_STALL_TIMEOUT,
        };

        Ok(Self {
            library,
            database_url: get("VAULTDL_DATABASE_URL").unwrap_or_else(|| {
                format!("sqlite:{}?mode=rwc", root.join("library.db").display())
            }),
            log_dir: get("VAULTDL_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| root.join("logs")),
            downloader_path: get("VAULTDL_DOWNLOADER_PATH")
                .unwrap_or_else(|| DEFAULT_DOWNLOADER.to_string()),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            stall_timeout,
        })
    }
}
