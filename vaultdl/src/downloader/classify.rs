//! Classification of downloader failures into short user-facing messages.

use serde::{Deserialize, Serialize};

/// Kind of terminal job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Browser cookie store could not be read.
    CookiesLocked,
    PrivateVideo,
    Unavailable,
    GeoRestricted,
    Premiere,
    InvalidUrl,
    RateLimited,
    Forbidden,
    TranscoderMissing,
    /// Downloader binary missing or not executable.
    LaunchFailed,
    /// Killed by the stall watchdog.
    Stalled,
    /// Download succeeded but registering the media failed.
    PostProcessing,
    /// Unrecognized downloader failure.
    Download,
}

impl ErrorKind {
    /// Fixed message for kinds that have one.
    pub fn message(&self) -> Option<&'static str> {
        let msg = match self {
            Self::CookiesLocked => {
                "Could not read browser cookies. Close the browser and try again."
            }
            Self::PrivateVideo => "This video is private.",
            Self::Unavailable => "This video is unavailable.",
            Self::GeoRestricted => "This video is not available in your country.",
            Self::Premiere => "This premiere has not started yet.",
            Self::InvalidUrl => "The URL is invalid.",
            Self::RateLimited => "Too many requests. Please wait and try again.",
            Self::Forbidden => "Access was denied by the server (403).",
            Self::TranscoderMissing => "FFmpeg is required but was not found.",
            Self::LaunchFailed => "The downloader could not be started.",
            Self::Stalled => "The download stalled and was stopped.",
            Self::PostProcessing => "The download finished but could not be added to the library.",
            Self::Download => return None,
        };
        Some(msg)
    }

    /// Whether resubmitting the same job can succeed without outside changes.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::LaunchFailed)
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: ErrorKind,
    pub message: String,
}

const UNKNOWN_ERROR: &str = "An unknown error occurred.";

/// Ordered signal table; first match wins.
const SIGNALS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::PrivateVideo, &["Private video"]),
    (ErrorKind::Unavailable, &["Video unavailable"]),
    (
        ErrorKind::GeoRestricted,
        &[
            "not available in your country",
            "made this video available in your country",
            "blocked it in your country",
            "not available from your location",
        ],
    ),
    (ErrorKind::Premiere, &["Premiere will begin in"]),
    (ErrorKind::InvalidUrl, &["Invalid URL", "is not a valid URL"]),
    (ErrorKind::RateLimited, &["429"]),
    (ErrorKind::Forbidden, &["403", "Forbidden"]),
    (
        ErrorKind::TranscoderMissing,
        &["ffmpeg not found", "ffprobe not found", "ffmpeg is not installed"],
    ),
];

/// Map accumulated stderr text to a classified failure.
pub fn classify(stderr: &str) -> Classified {
    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("cookie database") || lowered.contains("cookies database") {
        return fixed(ErrorKind::CookiesLocked);
    }

    if let Some((kind, _)) = SIGNALS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| stderr.contains(n)))
    {
        return fixed(*kind);
    }

    Classified {
        kind: ErrorKind::Download,
        message: fallback_message(stderr),
    }
}

fn fixed(kind: ErrorKind) -> Classified {
    Classified {
        kind,
        message: kind.message().unwrap_or(UNKNOWN_ERROR).to_string(),
    }
}

fn fallback_message(stderr: &str) -> String {
    let lines = || stderr.lines().map(str::trim).filter(|l| !l.is_empty());

    if let Some(text) = lines()
        .filter_map(|l| l.strip_prefix("ERROR:"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .last()
    {
        return text.to_string();
    }

    lines()
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ERROR: could not copy Chrome cookie database", ErrorKind::CookiesLocked)]
    #[case("ERROR: [youtube] abc: Private video. Sign in", ErrorKind::PrivateVideo)]
    #[case("ERROR: [youtube] abc: Video unavailable", ErrorKind::Unavailable)]
    #[case(
        "ERROR: [youtube] abc: The uploader has not made this video available in your country",
        ErrorKind::GeoRestricted
    )]
    #[case(
        "ERROR: [generic] abc: This video is not available from your location due to geo restriction",
        ErrorKind::GeoRestricted
    )]
    #[case(
        "ERROR: This video is not available in your country",
        ErrorKind::GeoRestricted
    )]
    #[case("ERROR: Premiere will begin in 3 hours", ErrorKind::Premiere)]
    #[case("ERROR: Invalid URL 'foo'", ErrorKind::InvalidUrl)]
    #[case("ERROR: HTTP Error 429: Too Many Requests", ErrorKind::RateLimited)]
    #[case("ERROR: HTTP Error 403: Forbidden", ErrorKind::Forbidden)]
    #[case("ERROR: Postprocessing: ffprobe and ffmpeg not found", ErrorKind::TranscoderMissing)]
    fn test_signal_table(#[case] stderr: &str, #[case] expected: ErrorKind) {
        assert_eq!(classify(stderr).kind, expected);
    }

    #[test]
    fn test_private_video_message() {
        let classified = classify("ERROR: Private video");
        assert_eq!(classified.kind, ErrorKind::PrivateVideo);
        assert_eq!(classified.message, "This video is private.");
    }

    #[test]
    fn test_first_match_wins() {
        // Both "Private video" and "403" are present; the table order decides.
        let classified = classify("HTTP Error 403\nERROR: Private video");
        assert_eq!(classified.kind, ErrorKind::PrivateVideo);
    }

    #[test]
    fn test_fallback_to_error_line() {
        let classified = classify("[info] foo\nERROR:   something odd happened  \n[debug] bar\n");
        assert_eq!(classified.kind, ErrorKind::Download);
        assert_eq!(classified.message, "something odd happened");
    }

    #[test]
    fn test_fallback_to_last_non_empty_line() {
        let classified = classify("first line\nTraceback: boom\n\n   \n");
        assert_eq!(classified.kind, ErrorKind::Download);
        assert_eq!(classified.message, "Traceback: boom");
    }

    #[test]
    fn test_fallback_to_unknown() {
        assert_eq!(classify("").message, UNKNOWN_ERROR);
        assert_eq!(classify("\n  \n").message, UNKNOWN_ERROR);
    }

    #[test]
    fn test_retriable() {
        assert!(!ErrorKind::LaunchFailed.is_retriable());
        assert!(ErrorKind::Stalled.is_retriable());
        assert!(ErrorKind::PostProcessing.is_retriable());
    }
}
