//! Downloader metadata sidecar (`<id>.info.json`).

use chrono::NaiveDate;
use serde::Deserialize;

/// Subset of the downloader's info JSON the pipeline uses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub artist: Option<String>,
    pub artists: Option<Vec<String>>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    /// `YYYYMMDD`.
    pub upload_date: Option<String>,
    pub webpage_url: Option<String>,
    pub extractor_key: Option<String>,
    pub thumbnail: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl MediaInfo {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// First non-empty of `artist`, `creator`, `uploader`.
    pub fn artist_string(&self) -> Option<&str> {
        non_empty(&self.artist)
            .or_else(|| non_empty(&self.creator))
            .or_else(|| non_empty(&self.uploader))
    }

    /// Explicit artist list, when present and non-empty.
    pub fn artist_list(&self) -> Option<&[String]> {
        self.artists
            .as_deref()
            .filter(|list| list.iter().any(|a| !a.trim().is_empty()))
    }

    pub fn uploader(&self) -> Option<&str> {
        non_empty(&self.uploader).or_else(|| non_empty(&self.channel))
    }

    /// Upload date as `YYYY-MM-DD`; unparseable values pass through.
    pub fn upload_date_iso(&self) -> Option<String> {
        let raw = non_empty(&self.upload_date)?;
        Some(
            NaiveDate::parse_from_str(raw, "%Y%m%d")
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|_| raw.to_string()),
        )
    }

    /// Origin site: extractor key lowercased, else the url host, else `unknown`.
    pub fn source(&self, url: &str) -> String {
        if let Some(key) = non_empty(&self.extractor_key) {
            return key.to_lowercase();
        }
        let page = non_empty(&self.webpage_url).unwrap_or(url);
        url::Url::parse(page)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
