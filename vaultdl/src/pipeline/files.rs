//! Locating the files the downloader left behind for one job.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::Result;
use crate::utils::fs::list_files_sorted;

const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "ass", "lrc"];
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

/// Role of a file produced by the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Metadata,
    Description,
    Thumbnail,
    Subtitle,
    Partial,
    Media,
}

/// Classify a file name that already starts with `<id>.`.
pub fn classify_artifact(file_name: &str) -> ArtifactKind {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".info.json") {
        return ArtifactKind::Metadata;
    }
    if lower.contains(".part-frag") {
        return ArtifactKind::Partial;
    }

    let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
    match ext {
        "description" => ArtifactKind::Description,
        e if THUMBNAIL_EXTENSIONS.contains(&e) => ArtifactKind::Thumbnail,
        e if SUBTITLE_EXTENSIONS.contains(&e) => ArtifactKind::Subtitle,
        e if PARTIAL_EXTENSIONS.contains(&e) => ArtifactKind::Partial,
        _ => ArtifactKind::Media,
    }
}

/// Files found for one job, first match per role in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub metadata: Option<PathBuf>,
    pub media: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    /// Every subtitle track, in name order.
    pub subtitles: Vec<PathBuf>,
    pub description: Option<PathBuf>,
}

/// Scan `dir` for files named `<id>.*`.
pub async fn find_artifacts(dir: &Path, id: &str) -> Result<Artifacts> {
    let prefix = format!("{id}.");
    let mut found = Artifacts::default();

    for path in list_files_sorted(dir).await? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&prefix) {
            continue;
        }

        let slot = match classify_artifact(name) {
            ArtifactKind::Metadata => &mut found.metadata,
            ArtifactKind::Description => &mut found.description,
            ArtifactKind::Thumbnail => &mut found.thumbnail,
            ArtifactKind::Subtitle => {
                found.subtitles.push(path);
                continue;
            }
            ArtifactKind::Media => &mut found.media,
            ArtifactKind::Partial => {
                debug!(file = %name, "Ignoring partial download");
                continue;
            }
        };
        if slot.is_none() {
            *slot = Some(path);
        } else {
            debug!(file = %name, "Ignoring additional artifact");
        }
    }

    Ok(found)
}

/// Language tag of a subtitle file: `en` for `<id>.en.srt`, empty for
/// `<id>.srt`.
pub fn subtitle_language<'a>(path: &'a Path, id: &str) -> &'a str {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(id))
        .and_then(|n| n.strip_prefix('.'))
        .and_then(|n| n.rsplit_once('.'))
        .map(|(lang, _)| lang)
        .unwrap_or_default()
}

/// Pick the subtitle whose language best matches `langs`, a comma-separated
/// list of patterns in preference order (`en.*,ja`, `all`, `-live_chat`).
///
/// Falls back to the first track that no `-` entry excludes.
pub fn preferred_subtitle(subtitles: &[PathBuf], id: &str, langs: &str) -> Option<usize> {
    let compile = |pattern: &str| {
        let pattern = if pattern == "all" { ".*" } else { pattern };
        Regex::new(&format!("(?i)^(?:{pattern})$")).ok()
    };
    let entries: Vec<&str> = langs
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let includes: Vec<Regex> = entries
        .iter()
        .filter(|p| !p.starts_with('-'))
        .filter_map(|p| compile(p))
        .collect();
    let excludes: Vec<Regex> = entries
        .iter()
        .filter_map(|p| p.strip_prefix('-'))
        .filter_map(compile)
        .collect();

    let candidates: Vec<(usize, &str)> = subtitles
        .iter()
        .map(|path| subtitle_language(path, id))
        .enumerate()
        .filter(|(_, lang)| !excludes.iter().any(|re| re.is_match(lang)))
        .collect();

    includes
        .iter()
        .find_map(|re| {
            candidates
                .iter()
                .find(|(_, lang)| re.is_match(lang))
                .map(|(idx, _)| *idx)
        })
        .or_else(|| candidates.first().map(|(idx, _)| *idx))
}

/// Extension of `path`, lowercased.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc.info.json", ArtifactKind::Metadata)]
    #[case("abc.description", ArtifactKind::Description)]
    #[case("abc.webp", ArtifactKind::Thumbnail)]
    #[case("abc.JPG", ArtifactKind::Thumbnail)]
    #[case("abc.en.vtt", ArtifactKind::Subtitle)]
    #[case("abc.mp4.part", ArtifactKind::Partial)]
    #[case("abc.f137.mp4.part-Frag12", ArtifactKind::Partial)]
    #[case("abc.mp4", ArtifactKind::Media)]
    #[case("abc.opus", ArtifactKind::Media)]
    fn test_classify(#[case] name: &str, #[case] expected: ArtifactKind) {
        assert_eq!(classify_artifact(name), expected);
    }

    #[tokio::test]
    async fn test_find_artifacts_matches_id_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "abc.info.json",
            "abc.mp4",
            "abc.webp",
            "abc.en.srt",
            "abc.description",
            "abc.mp4.part",
            "abcd.mp4",
            "other.mp4",
        ] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let found = find_artifacts(dir.path(), "abc").await.unwrap();
        assert_eq!(found.metadata, Some(dir.path().join("abc.info.json")));
        assert_eq!(found.media, Some(dir.path().join("abc.mp4")));
        assert_eq!(found.thumbnail, Some(dir.path().join("abc.webp")));
        assert_eq!(found.subtitles, vec![dir.path().join("abc.en.srt")]);
        assert_eq!(found.description, Some(dir.path().join("abc.description")));
    }

    fn tracks(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| Path::new("/media").join(n)).collect()
    }

    #[rstest]
    #[case(&["abc.de.srt", "abc.en.srt", "abc.fr.srt"], "en.*", Some(1))]
    #[case(&["abc.de.srt", "abc.en-US.vtt", "abc.fr.srt"], "en.*", Some(1))]
    #[case(&["abc.de.srt", "abc.en.srt", "abc.ja.srt"], "ja,en.*", Some(2))]
    #[case(&["abc.de.srt", "abc.fr.srt"], "en.*", Some(0))]
    #[case(&["abc.live_chat.json.srt", "abc.de.srt"], "all,-live_chat.*", Some(1))]
    #[case(&["abc.srt"], "en.*", Some(0))]
    #[case(&[], "en.*", None)]
    fn test_preferred_subtitle(
        #[case] names: &[&str],
        #[case] langs: &str,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(preferred_subtitle(&tracks(names), "abc", langs), expected);
    }

    #[test]
    fn test_subtitle_language() {
        assert_eq!(subtitle_language(Path::new("/m/abc.en-GB.srt"), "abc"), "en-GB");
        assert_eq!(subtitle_language(Path::new("/m/abc.srt"), "abc"), "");
    }

    #[tokio::test]
    async fn test_find_artifacts_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_artifacts(dir.path(), "abc").await.unwrap();
        assert_eq!(found, Artifacts::default());
    }
}
