//! Canonical text projections of memory records.

use crate::model::MemoryRecord;
use chrono::{DateTime, SecondsFormat};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a record as `[YYYY-MM-DD HH:MM:SS_<sequence>] Speaker: message`.
///
/// Falls back to `[Unknown time]` when the timestamp is out of range.
pub fn format_record(record: &MemoryRecord) -> String {
    let speaker = display_speaker(&record.speaker);
    match render_timestamp(record.timestamp) {
        Some(date) => format!(
            "[{date}_{}] {speaker}: {}",
            record.sequence, record.message
        ),
        None => format!("[Unknown time] {speaker}: {}", record.message),
    }
}

/// Format a record without the sequence suffix, as used by recent listings.
pub fn format_record_plain(record: &MemoryRecord) -> String {
    let speaker = display_speaker(&record.speaker);
    match render_timestamp(record.timestamp) {
        Some(date) => format!("[{date}] {speaker}: {}", record.message),
        None => format!("[Unknown time] {speaker}: {}", record.message),
    }
}

/// Render epoch seconds as a UTC `YYYY-MM-DD HH:MM:SS` string.
pub fn render_timestamp(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|date| date.format(DATE_FORMAT).to_string())
}

/// Render epoch seconds as RFC 3339 in UTC with milliseconds, e.g. `2023-11-14T22:13:20.000Z`.
pub fn rfc3339_timestamp(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_speaker(speaker: &str) -> String {
    if speaker.is_empty() {
        capitalize("unknown")
    } else {
        capitalize(speaker)
    }
}
