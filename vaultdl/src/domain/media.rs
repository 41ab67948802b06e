//! Library entities produced by the post-processing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::DownloadType;

/// A downloaded video or audio track as registered in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    /// Raw artist string before splitting.
    pub creator: Option<String>,
    pub description: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// `YYYY-MM-DD`.
    pub upload_date: Option<String>,
    pub original_url: String,
    pub file_path: String,
    pub cover_path: Option<String>,
    pub subtitle_path: Option<String>,
    pub has_embedded_subs: bool,
    #[serde(rename = "type")]
    pub media_type: DownloadType,
    pub downloaded_at: DateTime<Utc>,
    pub is_favorite: bool,
    /// Origin site, e.g. `youtube`.
    pub source: String,
}

/// An artist entity owned by the library store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub cover_path: Option<String>,
}

/// Outcome recorded in the download history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Failed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// One row of download history, keyed by url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: DownloadType,
    pub thumbnail: Option<String>,
    pub status: HistoryStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn success(record: &MediaRecord, thumbnail: Option<String>) -> Self {
        Self {
            url: record.original_url.clone(),
            title: record.title.clone(),
            media_type: record.media_type,
            thumbnail,
            status: HistoryStatus::Success,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(
        url: impl Into<String>,
        title: impl Into<String>,
        media_type: DownloadType,
        thumbnail: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            media_type,
            thumbnail,
            status: HistoryStatus::Failed,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}
