//! Record models persisted by memory stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted conversational utterance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Row identifier assigned by the store.
    pub id: i64,
    /// Who spoke (agent, user, system, ...).
    pub speaker: String,
    /// Normalized message text.
    pub message: String,
    /// Epoch seconds of the utterance.
    pub timestamp: i64,
    /// Disambiguator for records sharing `timestamp`.
    pub sequence: u32,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new memory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMemory {
    pub speaker: String,
    pub message: String,
    pub timestamp: i64,
    pub sequence: u32,
}

/// Result of inserting a record keyed by `(timestamp, sequence)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was written.
    Saved,
    /// A row with the same key already existed; nothing was written.
    Duplicate,
}

/// The running abstract of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbstractRecord {
    /// Row identifier assigned by the store.
    pub id: i64,
    /// Abstract text.
    pub abstract_content: String,
    /// Watermark: highest message timestamp folded into the abstract.
    pub last_processed_timestamp: i64,
    /// When the abstract row was first written.
    pub created_at: DateTime<Utc>,
    /// When the abstract was last replaced.
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counts exposed as a read-only projection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryStats {
    #[serde(rename = "totalMemories")]
    pub total_memories: u64,
    #[serde(rename = "uniqueSpeakers")]
    pub unique_speakers: u64,
    #[serde(rename = "abstracts")]
    pub abstract_count: u64,
}

/// A single column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub notnull: bool,
    pub dflt_value: Option<String>,
    pub pk: bool,
}
