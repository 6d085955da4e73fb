//! Title → directory name sanitization.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a sanitized name, in characters.
pub const MAX_NAME_CHARS: usize = 120;

static UNSAFE_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

/// Sanitizes a title for use as a directory name.
///
/// - Applies NFKC normalization and trims
/// - Replaces anything but word chars, whitespace, `(`, `)`, `.`, `-` with `_`
/// - Collapses whitespace runs into a single `_`
/// - Strips leading/trailing `_`, `.`, `-`
/// - Limits length to 120 characters
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_directory_name(title: &str) -> Option<String> {
    let normalized: String = title.nfkc().collect();
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return None;
    }

    let unsafe_re = UNSAFE_RE.get_or_init(|| Regex::new(r"[^\w\s().-]").expect("unsafe-char regex"));
    let whitespace_re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));

    let replaced = unsafe_re.replace_all(normalized, "_");
    let collapsed = whitespace_re.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches(|c| c == '_' || c == '.' || c == '-');
    if trimmed.is_empty() {
        return None;
    }

    Some(trimmed.chars().take(MAX_NAME_CHARS).collect())
}
