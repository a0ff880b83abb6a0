//! Memory service composing normalization, sequencing, storage and merging.

use crate::clock::{Clock, SystemClock};
use crate::format::{format_record_plain, rfc3339_timestamp};
use crate::merger::{AbstractComposer, AbstractMerger, TemplateComposer};
use crate::model::{MemoryRecord, MemoryStats, NewMemory, SaveOutcome};
use crate::normalize::{char_len, normalize};
use crate::policy::{AbstractPolicy, CapturePolicy, RecentPolicy, SequencePolicy};
use crate::sequence::SequenceAllocator;
use crate::store::{MemoryStore, SchemaInfo, degrade};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Text returned when no abstract has been stored yet.
pub const NO_ABSTRACT: &str = "No memory abstract available.";
/// Text returned when the recent window is empty.
pub const NO_RECENT: &str = "No recent memories found.";

/// Outcome status of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    /// The write happened.
    Success,
    /// The record already existed.
    Duplicate,
    /// The write was declined by the capture policy.
    Skipped,
    /// The store failed.
    Error,
}

/// Result of saving a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub status: WriteStatus,
    pub message: String,
}

impl SaveReport {
    fn new(status: WriteStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Current abstract as seen by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractRecall {
    /// Abstract text, or a sentinel when there is none.
    pub memories: String,
    /// Watermark of the abstract.
    pub last_updated: Option<i64>,
    /// When the abstract row was first written.
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of overwriting the abstract directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractUpdate {
    pub status: WriteStatus,
    pub message: String,
    pub abstract_content: Option<String>,
    pub last_processed_timestamp: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One record in the recent-memories projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub speaker: String,
    pub message: String,
    /// Epoch seconds, rendered as a string.
    pub timestamp: String,
    pub sequence: u32,
    /// RFC 3339 rendering of `timestamp`.
    pub datetime: Option<String>,
}

impl From<&MemoryRecord> for RawMessage {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            speaker: record.speaker.clone(),
            message: record.message.clone(),
            timestamp: record.timestamp.to_string(),
            sequence: record.sequence,
            datetime: rfc3339_timestamp(record.timestamp),
        }
    }
}

/// Recent records plus a formatted transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentMemories {
    pub raw_messages: Vec<RawMessage>,
    pub recent_memories: String,
}

/// Entry point for saving utterances and maintaining the abstract.
pub struct MemoryService {
    store: Arc<dyn MemoryStore>,
    allocator: SequenceAllocator,
    merger: AbstractMerger,
    capture: CapturePolicy,
    recent: RecentPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("merger", &self.merger)
            .field("capture", &self.capture)
            .field("recent", &self.recent)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl MemoryService {
    /// Create a service with default policies and the system clock.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self::builder(store).build()
    }

    /// Start configuring a service.
    pub fn builder(store: Arc<dyn MemoryStore>) -> MemoryServiceBuilder {
        MemoryServiceBuilder::new(store)
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Normalize and store an utterance.
    ///
    /// `timestamp` defaults to the current epoch second. Messages that are too
    /// short after normalization are skipped rather than stored.
    pub async fn save(&self, speaker: &str, message: &str, timestamp: Option<i64>) -> SaveReport {
        let timestamp = timestamp.unwrap_or_else(|| self.clock.epoch_seconds());
        let cleaned = normalize(message);
        let length = char_len(&cleaned);
        if length <= self.capture.min_message_chars {
            info!("skipping short message after normalization (speaker={speaker}, len={length})");
            return SaveReport::new(WriteStatus::Skipped, "Message too short after cleaning");
        }

        let sequence = self.allocator.allocate(timestamp);
        let memory = NewMemory {
            speaker: speaker.to_string(),
            message: cleaned,
            timestamp,
            sequence,
        };
        match self.store.save(memory).await {
            Ok(SaveOutcome::Saved) => {
                info!("saved memory (speaker={speaker}, timestamp={timestamp}, sequence={sequence})");
                SaveReport::new(WriteStatus::Success, "Memory saved successfully")
            }
            Ok(SaveOutcome::Duplicate) => {
                info!("memory already exists (timestamp={timestamp}, sequence={sequence})");
                SaveReport::new(WriteStatus::Duplicate, "Memory already exists")
            }
            Err(err) => {
                error!("failed to save memory (speaker={speaker}): {err}");
                SaveReport::new(WriteStatus::Error, err.to_string())
            }
        }
    }

    /// Bring the abstract up to date and return it.
    ///
    /// This may write: new records are folded in and the watermark advances.
    pub async fn recall_abstract(&self, force_refresh: bool) -> AbstractRecall {
        info!("recalling memory abstract (force_refresh={force_refresh})");
        let outcome = self.merger.run(self.store.as_ref(), force_refresh).await;
        debug!("abstract recall finished (mode={:?})", outcome.mode);
        AbstractRecall {
            memories: outcome.content,
            last_updated: outcome.watermark,
            created_at: outcome.record.map(|record| record.created_at),
        }
    }

    /// The stored abstract without merging anything new.
    pub async fn latest_abstract(&self) -> AbstractRecall {
        match degrade("latest_abstract", self.store.latest_abstract().await) {
            Some(record) => AbstractRecall {
                memories: record.abstract_content,
                last_updated: Some(record.last_processed_timestamp),
                created_at: Some(record.created_at),
            },
            None => AbstractRecall {
                memories: NO_ABSTRACT.to_string(),
                last_updated: None,
                created_at: None,
            },
        }
    }

    /// Overwrite the abstract with caller-merged content.
    ///
    /// `timestamp` defaults to the current epoch second; `0` counts as unset.
    pub async fn update_abstract(&self, content: &str, timestamp: Option<i64>) -> AbstractUpdate {
        let timestamp = timestamp
            .filter(|ts| *ts != 0)
            .unwrap_or_else(|| self.clock.epoch_seconds());
        info!("updating memory abstract (watermark={timestamp})");
        match self.store.upsert_abstract(content, timestamp).await {
            Ok(record) => AbstractUpdate {
                status: WriteStatus::Success,
                message: "Memory abstract updated successfully".to_string(),
                abstract_content: Some(record.abstract_content),
                last_processed_timestamp: Some(record.last_processed_timestamp),
                updated_at: Some(record.updated_at),
            },
            Err(err) => {
                error!("failed to update memory abstract: {err}");
                AbstractUpdate {
                    status: WriteStatus::Error,
                    message: format!("Error updating memory abstract: {err}"),
                    abstract_content: None,
                    last_processed_timestamp: None,
                    updated_at: None,
                }
            }
        }
    }

    /// Records from the last `max_days` days (default from policy), read-only.
    pub async fn recent(&self, max_days: Option<u32>) -> RecentMemories {
        let days = max_days.unwrap_or(self.recent.default_max_days);
        info!("getting recent memories (max_days={days})");
        let records = degrade("messages_in_window", self.store.messages_in_window(days).await);
        if records.is_empty() {
            return RecentMemories {
                raw_messages: Vec::new(),
                recent_memories: NO_RECENT.to_string(),
            };
        }
        RecentMemories {
            raw_messages: records.iter().map(RawMessage::from).collect(),
            recent_memories: records
                .iter()
                .map(format_record_plain)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Aggregate counts; zeros when the store fails.
    pub async fn stats(&self) -> MemoryStats {
        degrade("stats", self.store.stats().await)
    }

    /// Table and column listing; empty when the store fails.
    pub async fn schema(&self) -> SchemaInfo {
        degrade("schema", self.store.schema().await)
    }

    /// Plain-text overview of stored memory for an agent.
    pub async fn summary(&self, agent_name: &str, days_back: u32) -> String {
        let stats = self.stats().await;
        format!(
            "Memory Summary for Agent: {agent_name}\n\n\
             Looking back {days_back} days:\n\
             - Total memories stored: {}\n\
             - Unique speakers: {}\n\
             - Memory abstracts: {}\n\n\
             This is a summary of the stored conversation memories and abstracts for the specified agent.",
            stats.total_memories, stats.unique_speakers, stats.abstract_count
        )
    }
}

/// Builder for assembling a [`MemoryService`] with custom policies.
pub struct MemoryServiceBuilder {
    store: Arc<dyn MemoryStore>,
    clock: Arc<dyn Clock>,
    capture: CapturePolicy,
    sequence: SequencePolicy,
    abstract_policy: AbstractPolicy,
    composer: Arc<dyn AbstractComposer>,
    recent: RecentPolicy,
}

impl MemoryServiceBuilder {
    /// Seed a builder with default policies.
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            capture: CapturePolicy::default(),
            sequence: SequencePolicy::default(),
            abstract_policy: AbstractPolicy::default(),
            composer: Arc::new(TemplateComposer),
            recent: RecentPolicy::default(),
        }
    }

    /// Replace the time source shared by the service and its allocator.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the capture policy.
    pub fn capture(mut self, capture: CapturePolicy) -> Self {
        self.capture = capture;
        self
    }

    /// Replace the sequence policy.
    pub fn sequence(mut self, sequence: SequencePolicy) -> Self {
        self.sequence = sequence;
        self
    }

    /// Replace the abstract policy.
    pub fn abstract_policy(mut self, policy: AbstractPolicy) -> Self {
        self.abstract_policy = policy;
        self
    }

    /// Plug in a different abstract composer.
    pub fn composer(mut self, composer: Arc<dyn AbstractComposer>) -> Self {
        self.composer = composer;
        self
    }

    /// Replace the recent-memories policy.
    pub fn recent(mut self, recent: RecentPolicy) -> Self {
        self.recent = recent;
        self
    }

    /// Finalize the service.
    pub fn build(self) -> MemoryService {
        MemoryService {
            allocator: SequenceAllocator::new(self.sequence, self.clock.clone()),
            merger: AbstractMerger::new(self.abstract_policy, self.composer),
            store: self.store,
            capture: self.capture,
            recent: self.recent,
            clock: self.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryService, NO_ABSTRACT, NO_RECENT, WriteStatus};
    use crate::clock::{Clock, ManualClock};
    use crate::error::MemoryError;
    use crate::merger::NO_HISTORY;
    use crate::model::{AbstractRecord, MemoryRecord, MemoryStats, NewMemory, SaveOutcome};
    use crate::policy::CapturePolicy;
    use crate::sqlite::SqliteMemoryStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn service() -> (MemoryService, Arc<SqliteMemoryStore>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_epoch(NOW));
        let store = Arc::new(SqliteMemoryStore::open_in_memory_with_clock(clock.clone()).expect("store"));
        let service = MemoryService::builder(store.clone()).clock(clock).build();
        (service, store)
    }

    #[derive(Debug)]
    struct BrokenStore;

    fn broken() -> MemoryError {
        MemoryError::Invalid("disk unavailable".to_string())
    }

    #[async_trait]
    impl MemoryStore for BrokenStore {
        async fn save(&self, _memory: NewMemory) -> Result<SaveOutcome, MemoryError> {
            Err(broken())
        }

        async fn latest_abstract(&self) -> Result<Option<AbstractRecord>, MemoryError> {
            Err(broken())
        }

        async fn upsert_abstract(&self, _content: &str, _ts: i64) -> Result<AbstractRecord, MemoryError> {
            Err(broken())
        }

        async fn messages_after(&self, _timestamp: i64) -> Result<Vec<MemoryRecord>, MemoryError> {
            Err(broken())
        }

        async fn messages_in_window(&self, _max_days: u32) -> Result<Vec<MemoryRecord>, MemoryError> {
            Err(broken())
        }

        async fn stats(&self) -> Result<MemoryStats, MemoryError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn saved_message_is_normalized_and_listed() {
        let (service, _) = service();
        let report = service
            .save("user", "<speak>Hello   there</speak>\n", Some(NOW - 60))
            .await;
        assert_eq!(report.status, WriteStatus::Success);

        let recent = service.recent(None).await;
        assert_eq!(recent.raw_messages.len(), 1);
        let raw = &recent.raw_messages[0];
        assert_eq!(raw.message, "Hello there");
        assert_eq!(raw.timestamp, (NOW - 60).to_string());
        assert_eq!(raw.sequence, 0);
        assert_eq!(raw.datetime.as_deref(), Some("2023-11-14T22:12:20.000Z"));
        assert_eq!(recent.recent_memories, "[2023-11-14 22:12:20] User: Hello there");
    }

    #[tokio::test]
    async fn short_messages_are_skipped() {
        let (service, store) = service();
        let report = service.save("user", "<b> hi </b>", None).await;
        assert_eq!(report.status, WriteStatus::Skipped);
        assert_eq!(store.stats().await.expect("stats").total_memories, 0);

        let report = service.save("user", "hey", None).await;
        assert_eq!(report.status, WriteStatus::Success);
    }

    #[tokio::test]
    async fn capture_threshold_is_configurable() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_epoch(NOW));
        let store = Arc::new(SqliteMemoryStore::open_in_memory_with_clock(clock.clone()).expect("store"));
        let service = MemoryService::builder(store)
            .clock(clock)
            .capture(CapturePolicy {
                min_message_chars: 5,
            })
            .build();
        assert_eq!(service.save("user", "hello", None).await.status, WriteStatus::Skipped);
        assert_eq!(service.save("user", "hello!", None).await.status, WriteStatus::Success);
    }

    #[tokio::test]
    async fn same_second_saves_get_distinct_sequences() {
        let (service, _) = service();
        for text in ["first one", "second one", "third one"] {
            let report = service.save("agent", text, Some(NOW)).await;
            assert_eq!(report.status, WriteStatus::Success);
        }
        let recent = service.recent(Some(1)).await;
        let sequences: Vec<u32> = recent.raw_messages.iter().map(|raw| raw.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn fresh_allocator_reports_duplicate() {
        let (service, store) = service();
        assert_eq!(service.save("user", "original", Some(NOW)).await.status, WriteStatus::Success);

        let restarted = MemoryService::builder(store)
            .clock(Arc::new(ManualClock::at_epoch(NOW)))
            .build();
        let report = restarted.save("user", "replayed", Some(NOW)).await;
        assert_eq!(report.status, WriteStatus::Duplicate);
        assert_eq!(report.message, "Memory already exists");
    }

    #[tokio::test]
    async fn recall_without_history_is_sentinel() {
        let (service, _) = service();
        let recall = service.recall_abstract(false).await;
        assert_eq!(recall.memories, NO_HISTORY);
        assert_eq!(recall.last_updated, None);
        assert_eq!(recall.created_at, None);
    }

    #[tokio::test]
    async fn recall_folds_saved_messages() {
        let (service, _) = service();
        service.save("user", "what is the weather", Some(NOW - 30)).await;
        service.save("agent", "sunny all day", Some(NOW - 20)).await;

        let recall = service.recall_abstract(false).await;
        assert!(recall.memories.contains("User: what is the weather"));
        assert!(recall.memories.contains("Agent: sunny all day"));
        assert_eq!(recall.last_updated, Some(NOW - 20));
        assert!(recall.created_at.is_some());

        let latest = service.latest_abstract().await;
        assert_eq!(latest.memories, recall.memories);
        assert_eq!(latest.last_updated, Some(NOW - 20));
    }

    #[tokio::test]
    async fn update_abstract_round_trips() {
        let (service, _) = service();
        assert_eq!(service.latest_abstract().await.memories, NO_ABSTRACT);

        let update = service.update_abstract("caller summary", Some(NOW - 30)).await;
        assert_eq!(update.status, WriteStatus::Success);
        assert_eq!(update.abstract_content.as_deref(), Some("caller summary"));
        assert_eq!(update.last_processed_timestamp, Some(NOW - 30));

        let latest = service.latest_abstract().await;
        assert_eq!(latest.memories, "caller summary");
        assert_eq!(latest.last_updated, Some(NOW - 30));

        let update = service.update_abstract("later summary", None).await;
        assert_eq!(update.last_processed_timestamp, Some(NOW));
        assert_eq!(service.stats().await.abstract_count, 1);
    }

    #[tokio::test]
    async fn zero_watermark_means_now() {
        let (service, _) = service();
        service.save("user", "already covered by caller", Some(NOW - 10)).await;

        let update = service.update_abstract("caller summary", Some(0)).await;
        assert_eq!(update.last_processed_timestamp, Some(NOW));

        let recall = service.recall_abstract(false).await;
        assert_eq!(recall.memories, "caller summary");
        assert_eq!(recall.last_updated, Some(NOW));
    }

    #[tokio::test]
    async fn empty_window_reports_sentinel() {
        let (service, _) = service();
        service.save("user", "too old to show", Some(NOW - 5 * 86_400)).await;
        let recent = service.recent(None).await;
        assert!(recent.raw_messages.is_empty());
        assert_eq!(recent.recent_memories, NO_RECENT);
    }

    #[tokio::test]
    async fn summary_reports_counts() {
        let (service, _) = service();
        service.save("user", "hello agent", Some(NOW - 2)).await;
        service.save("agent", "hello user", Some(NOW - 1)).await;
        let summary = service.summary("helper", 7).await;
        assert!(summary.starts_with("Memory Summary for Agent: helper"));
        assert!(summary.contains("Looking back 7 days:"));
        assert!(summary.contains("- Total memories stored: 2"));
        assert!(summary.contains("- Unique speakers: 2"));
        assert!(summary.contains("- Memory abstracts: 0"));
    }

    #[tokio::test]
    async fn store_faults_degrade() {
        let service = MemoryService::builder(Arc::new(BrokenStore))
            .clock(Arc::new(ManualClock::at_epoch(NOW)))
            .build();

        let report = service.save("user", "hello world", None).await;
        assert_eq!(report.status, WriteStatus::Error);
        assert!(report.message.contains("disk unavailable"));

        let update = service.update_abstract("content", None).await;
        assert_eq!(update.status, WriteStatus::Error);
        assert_eq!(update.abstract_content, None);
        assert_eq!(update.updated_at, None);

        assert_eq!(service.recent(None).await.recent_memories, NO_RECENT);
        assert_eq!(service.stats().await, MemoryStats::default());
        assert!(service.schema().await.is_empty());
        assert_eq!(service.latest_abstract().await.memories, NO_ABSTRACT);
        assert_eq!(service.recall_abstract(false).await.memories, NO_HISTORY);
    }
}
