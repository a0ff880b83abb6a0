//! Message text normalization applied before storage.

use regex::Regex;
use std::sync::LazyLock;

/// Angle-bracket markup spans such as `<speak>` or `</break time="1s">`.
static MARKUP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Strip markup and collapse whitespace.
///
/// Tags are removed without nesting awareness; a `<` with no closing `>` is
/// kept as text. Whitespace runs (newlines included) become a single space
/// and the result is trimmed.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let stripped = match MARKUP.as_ref() {
        Some(regex) => regex.replace_all(raw, ""),
        None => raw.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length used for the too-short check, in Unicode scalar values.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
