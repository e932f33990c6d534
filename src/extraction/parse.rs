//! Text-parsing sub-routines for extracted element groups
//!
//! These are the per-field heuristics: abbreviated member counts
//! ("1.2K members"), privacy vocabulary, activity phrases ("5 posts a
//! day"), and canonical identifiers from link paths. Each routine is pure
//! and total over its input; a failure is returned, never thrown, so one
//! bad record can be skipped without losing the batch.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::constants::ACTIVITY_SCALE_FALLBACK_RATIO;
use crate::domain::{ActivitySignals, EntityCategory};
use crate::error::ParseFailure;

/// `<number><unit?> <memberWord>` with K/M abbreviations.
static SCALE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9][0-9.,]*)\s*([KM])?\s*(?:members?|followers?|people)\b")
        .expect("scale pattern is valid")
});

/// `<number> posts a <period>` activity phrases.
static ACTIVITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9][0-9.,]*)\s*([KM])?\s*(?:new\s+)?posts?\s+(?:a|per|each)\s+(day|week|month|year)")
        .expect("activity pattern is valid")
});

/// Words that mark an entity as non-public anywhere in its text.
const PRIVACY_VOCABULARY: &[&str] = &["private", "closed", "invite only", "members only"];

/// Parses a numeric token with an optional K/M abbreviation suffix.
pub fn parse_abbreviated(number: &str, suffix: Option<&str>) -> Result<u64, ParseFailure> {
    let cleaned = number.replace(',', "");
    let base: f64 = cleaned
        .parse()
        .map_err(|_| ParseFailure::BadNumber(number.to_string()))?;
    let factor = match suffix.map(str::to_ascii_uppercase).as_deref() {
        Some("K") => 1_000.0,
        Some("M") => 1_000_000.0,
        _ => 1.0,
    };
    Ok((base * factor).round() as u64)
}

/// First scale phrase in the group's text, if any.
pub fn parse_scale(text: &str) -> Option<u64> {
    let caps = SCALE_RE.captures(text)?;
    let number = caps.get(1)?.as_str();
    let suffix = caps.get(2).map(|m| m.as_str());
    parse_abbreviated(number, suffix).ok()
}

/// Category from privacy-indicating vocabulary; public when absent.
pub fn detect_category(text: &str) -> EntityCategory {
    let lowered = text.to_lowercase();
    if PRIVACY_VOCABULARY.iter().any(|word| lowered.contains(word)) {
        EntityCategory::Private
    } else {
        EntityCategory::Public
    }
}

/// Keyword-based activity estimates with a scale-proportional fallback.
///
/// Weekly phrases fold into the per-day signal. When nothing matches, the
/// monthly estimate defaults to a fixed fraction of the entity's scale.
pub fn estimate_activity(text: &str, scale: u64) -> ActivitySignals {
    let mut signals = ActivitySignals::default();
    for caps in ACTIVITY_RE.captures_iter(text) {
        let number = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let suffix = caps.get(2).map(|m| m.as_str());
        let Ok(count) = parse_abbreviated(number, suffix) else {
            continue;
        };
        let count = count as f64;
        match caps.get(3).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("day") => signals.posts_per_day = Some(count),
            Some("week") => signals.posts_per_day = Some(count / 7.0),
            Some("month") => signals.posts_per_month = Some(count),
            Some("year") => signals.posts_per_year = Some(count),
            _ => {}
        }
    }
    if signals.is_empty() {
        signals.posts_per_month = Some(scale as f64 * ACTIVITY_SCALE_FALLBACK_RATIO);
    }
    signals
}

/// Stable identifier: the path segment following `path_fragment` in a
/// link's canonical path. Works on absolute and relative hrefs.
pub fn canonical_id(href: &str, path_fragment: &str) -> Option<String> {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        // Relative href: strip query/fragment by hand.
        Err(_) => href
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let start = path.find(path_fragment)? + path_fragment.len();
    let id = path[start..]
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    (!id.is_empty()).then(|| id.to_string())
}
