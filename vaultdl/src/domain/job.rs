//! Download job definitions.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Descriptor produced by the information-fetch phase.
///
/// Owned by the caller; the scheduler only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Canonical URL handed to the downloader.
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Which kind of media a job materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    #[default]
    Video,
    Audio,
}

impl DownloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for DownloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video quality ceiling.
///
/// Serialized as `"best"` or a pixel height such as `"1080"` / `1080`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    MaxHeight(u32),
}

impl Quality {
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::MaxHeight(h) => Some(*h),
        }
    }
}

impl std::str::FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("best") {
            return Ok(Self::Best);
        }
        let digits = s.strip_suffix(['p', 'P']).unwrap_or(s);
        digits
            .parse::<u32>()
            .ok()
            .filter(|h| *h > 0)
            .map(Self::MaxHeight)
            .ok_or_else(|| Error::validation(format!("invalid quality: {s:?}")))
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::MaxHeight(h) => write!(f, "{h}"),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Height(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Height(0) => Err(serde::de::Error::custom("quality height must be positive")),
            Raw::Height(h) => Ok(Self::MaxHeight(h)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> u8 {
    10
}

/// A request to download and register a single media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub video_info: VideoInfo,
    #[serde(default)]
    pub download_type: DownloadType,

    // Video options
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub download_subs: bool,

    // Audio options
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    /// 0-10, higher is better.
    #[serde(default = "default_audio_quality")]
    pub audio_quality: u8,

    #[serde(default)]
    pub playlist_id: Option<i64>,
    /// Range selector such as `1-3,7`.
    #[serde(default)]
    pub playlist_items: Option<String>,
    #[serde(default)]
    pub live_from_start: bool,
}

impl Job {
    /// Create a video job with default options.
    pub fn video(video_info: VideoInfo) -> Self {
        Self {
            video_info,
            download_type: DownloadType::Video,
            quality: Quality::Best,
            download_subs: false,
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            playlist_id: None,
            playlist_items: None,
            live_from_start: false,
        }
    }

    /// Create an audio job with default options.
    pub fn audio(video_info: VideoInfo) -> Self {
        Self {
            download_type: DownloadType::Audio,
            ..Self::video(video_info)
        }
    }

    pub fn id(&self) -> &str {
        &self.video_info.id
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_subtitles(mut self, enabled: bool) -> Self {
        self.download_subs = enabled;
        self
    }

    pub fn with_audio(mut self, format: impl Into<String>, quality: u8) -> Self {
        self.audio_format = format.into();
        self.audio_quality = quality;
        self
    }

    pub fn with_playlist(mut self, playlist_id: i64) -> Self {
        self.playlist_id = Some(playlist_id);
        self
    }

    pub fn with_playlist_items(mut self, items: impl Into<String>) -> Self {
        self.playlist_items = Some(items.into());
        self
    }

    pub fn with_live_from_start(mut self, enabled: bool) -> Self {
        self.live_from_start = enabled;
        self
    }

    /// Encoder quality on the downloader's 0 (best) .. 10 (worst) scale.
    pub fn encoder_audio_quality(&self) -> u8 {
        10 - self.audio_quality.min(10)
    }

    /// Reject jobs that can never start.
    pub fn validate(&self) -> Result<()> {
        let id = self.video_info.id.trim();
        if id.is_empty() {
            return Err(Error::validation("job has an empty video id"));
        }
        if id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::validation(format!("unsafe video id: {id:?}")));
        }
        if self.video_info.url.trim().is_empty() {
            return Err(Error::validation(format!("job {id} has no url")));
        }
        if self.download_type == DownloadType::Audio && self.audio_format.trim().is_empty() {
            return Err(Error::validation(format!("job {id} has no audio format")));
        }
        Ok(())
    }
}
