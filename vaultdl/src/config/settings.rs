//! User-facing download settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Subtitle languages requested when none are configured.
pub const DEFAULT_SUBTITLE_LANGS: &str = "en.*";

/// Snapshot of the settings consumed per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Maximum number of jobs running at once.
    pub concurrent_downloads: usize,
    /// Fragments fetched in parallel per job (HLS/DASH).
    pub concurrent_fragments: u32,
    /// Browser to borrow cookies from.
    pub cookie_browser: Option<String>,
    pub download_auto_subs: bool,
    /// Subtitle language patterns in preference order, comma separated,
    /// e.g. `en.*,ja`. Entries starting with `-` exclude.
    pub subtitle_langs: String,
    pub remove_sponsors: bool,
    /// Transfer rate cap passed verbatim, e.g. `5M`.
    pub speed_limit: Option<String>,
    /// Embed the thumbnail into extracted audio files.
    pub embed_thumbnail: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrent_downloads: 3,
            concurrent_fragments: 1,
            cookie_browser: None,
            download_auto_subs: false,
            subtitle_langs: DEFAULT_SUBTITLE_LANGS.to_string(),
            remove_sponsors: false,
            speed_limit: None,
            embed_thumbnail: true,
        }
    }
}

impl Settings {
    /// Concurrency bound used for admission; never below one.
    pub fn max_concurrent(&self) -> usize {
        self.concurrent_downloads.max(1)
    }

    pub fn with_concurrent_downloads(mut self, n: usize) -> Self {
        self.concurrent_downloads = n;
        self
    }

    /// Load settings from a JSON file, falling back to defaults for missing keys.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_path("reading settings file", path, e))?;
        let settings: Settings = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrent_downloads == 0 {
            return Err(Error::config("concurrentDownloads must be at least 1"));
        }
        if self.subtitle_langs.trim().is_empty() {
            return Err(Error::config("subtitleLangs must not be blank"));
        }
        if let Some(limit) = &self.speed_limit
            && limit.trim().is_empty()
        {
            return Err(Error::config("speedLimit must not be blank"));
        }
        Ok(())
    }
}
