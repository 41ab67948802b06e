//! Artist name extraction.
//!
//! Separator tokens (`;`, `feat.`, `ft.`, `featuring`) always split. Commas
//! split the resulting pieces further, except inside a known comma-bearing
//! name or a `Name, The Something` form.

use std::sync::LazyLock;

use regex::Regex;

/// Returned when nothing usable remains.
pub const UNKNOWN_ARTIST: &str = "Unknown";

static SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i);|\bfeat\.|\bft\.|\bfeaturing\b").unwrap());

static TOPIC_SUFFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+-\s+topic$").unwrap());

const KNOWN_COMMA_NAMES: &[&str] = &[
    "earth, wind & fire",
    "crosby, stills, nash & young",
    "crosby, stills & nash",
    "blood, sweat & tears",
    "emerson, lake & palmer",
    "peter, paul and mary",
    "peter, paul & mary",
    "tyler, the creator",
];

const PLACEHOLDERS: &[&str] = &["various artists", "various", "unknown artist", "topic"];

/// Split a raw artist string into individual names.
pub fn split_artists(raw: Option<&str>) -> Vec<String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let pieces = SEPARATOR_REGEX
        .split(raw)
        .flat_map(split_on_free_commas)
        .collect();
    normalize(pieces)
}

/// Clean an explicit artist list with the same rules as [`split_artists`].
pub fn normalize_artists<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize(names.into_iter().map(|s| s.as_ref().to_string()).collect())
}

fn normalize(pieces: Vec<String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for piece in pieces {
        let trimmed = piece.trim_matches(|c: char| c.is_whitespace() || "()[]".contains(c));
        let name = TOPIC_SUFFIX_REGEX.replace(trimmed, "");
        let name = name.trim();
        if name.is_empty() || PLACEHOLDERS.iter().any(|p| name.eq_ignore_ascii_case(p)) {
            continue;
        }
        if names.iter().any(|n| n.to_lowercase() == name.to_lowercase()) {
            continue;
        }
        names.push(name.to_string());
    }

    if names.is_empty() {
        names.push(UNKNOWN_ARTIST.to_string());
    }
    names
}

fn split_on_free_commas(raw: &str) -> Vec<String> {
    // ASCII lowering keeps byte offsets aligned with `raw`.
    let lowered = raw.to_ascii_lowercase();
    let protected: Vec<(usize, usize)> = KNOWN_COMMA_NAMES
        .iter()
        .flat_map(|name| {
            lowered
                .match_indices(name)
                .map(|(start, m)| (start, start + m.len()))
        })
        .collect();

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in raw.match_indices(',') {
        let in_known_name = protected.iter().any(|(s, e)| (*s..*e).contains(&idx));
        let before_the = lowered[idx + 1..].trim_start().starts_with("the ")
            && lowered[idx + 1..].starts_with(char::is_whitespace);
        if in_known_name || before_the {
            continue;
        }
        pieces.push(raw[start..idx].to_string());
        start = idx + 1;
    }
    pieces.push(raw[start..].to_string());
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Simon & Garfunkel; Hall & Oates", &["Simon & Garfunkel", "Hall & Oates"])]
    #[case("Tyler, The Creator; Earth, Wind & Fire", &["Tyler, The Creator", "Earth, Wind & Fire"])]
    #[case("Artist A; ; Artist B", &["Artist A", "Artist B"])]
    #[case("", &["Unknown"])]
    #[case("Daft Punk feat. Pharrell Williams", &["Daft Punk", "Pharrell Williams"])]
    #[case("Main (ft. Guest)", &["Main", "Guest"])]
    #[case("A Featuring B", &["A", "B"])]
    #[case("Alpha, Beta, Gamma", &["Alpha", "Beta", "Gamma"])]
    #[case("Earth, Wind & Fire", &["Earth, Wind & Fire"])]
    #[case("Tyler, The Creator, Frank Ocean", &["Tyler, The Creator", "Frank Ocean"])]
    #[case("Some Band - Topic", &["Some Band"])]
    #[case("Various Artists", &["Unknown"])]
    #[case("Topic", &["Unknown"])]
    #[case("Duo; duo; DUO", &["Duo"])]
    #[case("Featherweight", &["Featherweight"])]
    #[case("Drake, Future feat. Lil Wayne", &["Drake", "Future", "Lil Wayne"])]
    #[case("Tyler, The Creator feat. Kali Uchis, Earth, Wind & Fire", &["Tyler, The Creator", "Kali Uchis", "Earth, Wind & Fire"])]
    fn test_split(#[case] raw: &str, #[case] expected: &[&str]) {
        assert_eq!(split_artists(Some(raw)), expected);
    }

    #[test]
    fn test_missing_input() {
        assert_eq!(split_artists(None), vec![UNKNOWN_ARTIST]);
    }

    #[test]
    fn test_normalize_explicit_list() {
        let names = normalize_artists(["  One ", "Two - Topic", "one", "Various"]);
        assert_eq!(names, vec!["One", "Two"]);
    }

    proptest! {
        #[test]
        fn never_empty_and_never_blank(raw in ".{0,60}") {
            let names = split_artists(Some(&raw));
            prop_assert!(!names.is_empty());
            for name in &names {
                prop_assert!(!name.trim().is_empty());
                prop_assert_eq!(name.trim(), name.as_str());
            }
        }

        #[test]
        fn semicolon_joined_names_round_trip(
            parts in proptest::collection::vec("[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8})?", 1..5)
        ) {
            let mut unique: Vec<String> = Vec::new();
            for p in &parts {
                if !unique.iter().any(|u| u.eq_ignore_ascii_case(p)) {
                    unique.push(p.clone());
                }
            }
            let expected: Vec<String> = unique
                .into_iter()
                .filter(|n| {
                    !PLACEHOLDERS.iter().any(|p| n.eq_ignore_ascii_case(p))
                        && !SEPARATOR_REGEX.is_match(n)
                })
                .collect();
            prop_assume!(!expected.is_empty());
            prop_assume!(parts.iter().all(|p| !SEPARATOR_REGEX.is_match(p)));

            let names = split_artists(Some(&parts.join("; ")));
            prop_assert_eq!(names, expected);
        }
    }
}
