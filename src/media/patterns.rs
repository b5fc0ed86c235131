//! Platform URL detection.
//!
//! Patterns are compile-time validated via the `lazy_regex!` macro and
//! checked in a fixed order; the first pattern that matches anywhere in the
//! body wins.

use lazy_regex::lazy_regex;

static RE_INSTAGRAM: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:www\.)?instagram\.com/(?:reels?|p|tv|stories)/\S+");

static RE_TIKTOK: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:www\.|vm\.|vt\.)?tiktok\.com/\S+");

static RE_TWITTER: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:www\.|mobile\.)?(?:twitter\.com|x\.com)/\S+/status/\S+");

static RE_YOUTUBE_SHORT: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:www\.)?(?:youtube\.com/shorts/|youtu\.be/)\S+");

static RE_FACEBOOK: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:(?:www\.)?facebook\.com/(?:watch|reel|share)\S*|fb\.watch/\S+)");

static RE_REDDIT: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"https?://(?:www\.|old\.)?reddit\.com/r/\S+");

static PLATFORM_PATTERNS: [&lazy_regex::Lazy<regex::Regex>; 6] = [
    &RE_INSTAGRAM,
    &RE_TIKTOK,
    &RE_TWITTER,
    &RE_YOUTUBE_SHORT,
    &RE_FACEBOOK,
    &RE_REDDIT,
];

/// Returns the first platform URL embedded in `body`, if any.
#[must_use]
pub fn detect_url(body: &str) -> Option<&str> {
    PLATFORM_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(body).map(|m| m.as_str()))
}
