//! Downloader progress line parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::events::ProgressUpdate;

/// `[download]  45.3% of ~ 12.34MiB at  1.23MiB/s ETA 00:10 (frag 3/20)`
static PROGRESS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(?P<percent>\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*(?P<size>\S+))?(?:\s+at\s+(?P<speed>Unknown B/s|\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
    )
    .unwrap()
});

/// Parse a progress line; any other line yields `None`.
pub fn parse_progress(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_REGEX.captures(line.trim())?;
    let percent: f64 = caps.name("percent")?.as_str().parse().ok()?;

    let field = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str())
            .filter(|v| !v.starts_with("Unknown"))
            .map(str::to_string)
    };

    Some(ProgressUpdate {
        percent: percent.clamp(0.0, 100.0),
        total_size: field("size"),
        speed: field("speed"),
        eta: field("eta"),
    })
}
