use async_trait::async_trait;
use openmemory_rs_memory::{
    AbstractComposer, AbstractRecord, ManualClock, MemoryError, MemoryRecord,
    MemoryService, MemoryStats, MemoryStore, NewMemory, SaveOutcome, SchemaInfo,
    SqliteMemoryStore, TemplateComposer, WriteStatus,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Fixed "now" used by [`TestMemory`]: 2023-11-14 22:13:20 UTC.
pub const TEST_EPOCH: i64 = 1_700_000_000;

/// In-memory store and service driven by a manual clock.
#[derive(Debug, Clone)]
pub struct TestMemory {
    pub service: Arc<MemoryService>,
    pub store: Arc<SqliteMemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestMemory {
    pub fn new() -> Self {
        Self::with_composer(Arc::new(TemplateComposer))
    }

    pub fn with_composer(composer: Arc<dyn AbstractComposer>) -> Self {
        let clock = Arc::new(ManualClock::at_epoch(TEST_EPOCH));
        let store = Arc::new(
            SqliteMemoryStore::open_in_memory_with_clock(clock.clone())
                .expect("open in-memory store"),
        );
        let service = Arc::new(
            MemoryService::builder(store.clone())
                .clock(clock.clone())
                .composer(composer)
                .build(),
        );
        Self {
            service,
            store,
            clock,
        }
    }

    /// Save through the service, panicking unless the record was stored.
    pub async fn seed(&self, speaker: &str, message: &str, timestamp: i64) {
        let report = self.service.save(speaker, message, Some(timestamp)).await;
        assert_eq!(report.status, WriteStatus::Success, "seed failed: {report:?}");
    }

    pub async fn records_after(&self, timestamp: i64) -> Vec<MemoryRecord> {
        self.store
            .messages_after(timestamp)
            .await
            .expect("messages_after")
    }
}

impl Default for TestMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Store whose every operation fails.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> MemoryError {
        MemoryError::Invalid(self.message.clone())
    }
}

#[async_trait]
impl MemoryStore for FailingStore {
    async fn save(&self, _memory: NewMemory) -> Result<SaveOutcome, MemoryError> {
        Err(self.error())
    }

    async fn latest_abstract(&self) -> Result<Option<AbstractRecord>, MemoryError> {
        Err(self.error())
    }

    async fn upsert_abstract(
        &self,
        _content: &str,
        _last_processed_timestamp: i64,
    ) -> Result<AbstractRecord, MemoryError> {
        Err(self.error())
    }

    async fn messages_after(&self, _timestamp: i64) -> Result<Vec<MemoryRecord>, MemoryError> {
        Err(self.error())
    }

    async fn messages_in_window(&self, _max_days: u32) -> Result<Vec<MemoryRecord>, MemoryError> {
        Err(self.error())
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        Err(self.error())
    }

    async fn schema(&self) -> Result<SchemaInfo, MemoryError> {
        Err(self.error())
    }
}

/// Calls observed by [`RecordingComposer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerCall {
    Merge { previous: String, lines: Vec<String> },
    Rebuild { total: usize, lines: Vec<String> },
}

/// Composer that records its inputs and returns short markers.
#[derive(Debug, Default)]
pub struct RecordingComposer {
    calls: Mutex<Vec<ComposerCall>>,
}

impl RecordingComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ComposerCall> {
        self.calls.lock().clone()
    }
}

impl AbstractComposer for RecordingComposer {
    fn merge(&self, previous: &str, lines: &[String]) -> String {
        self.calls.lock().push(ComposerCall::Merge {
            previous: previous.to_string(),
            lines: lines.to_vec(),
        });
        format!("merged {} lines", lines.len())
    }

    fn rebuild(&self, total: usize, lines: &[String]) -> String {
        self.calls.lock().push(ComposerCall::Rebuild {
            total,
            lines: lines.to_vec(),
        });
        format!("rebuilt from {total} messages")
    }
}
