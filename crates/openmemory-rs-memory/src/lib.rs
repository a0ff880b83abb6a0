//! Conversational memory storage, sequencing and abstract maintenance.

pub mod clock;
pub mod error;
pub mod format;
pub mod merger;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod sequence;
pub mod service;
pub mod sqlite;
pub mod store;

/// Time sources.
pub use clock::{Clock, ManualClock, SystemClock};
/// Memory error type.
pub use error::MemoryError;
/// Record formatting helpers.
pub use format::{format_record, format_record_plain};
/// Abstract merging.
pub use merger::{AbstractComposer, AbstractMerger, AbstractOutcome, MergeMode, NO_HISTORY, TemplateComposer};
/// Record models.
pub use model::{AbstractRecord, ColumnInfo, MemoryRecord, MemoryStats, NewMemory, SaveOutcome};
/// Message normalization.
pub use normalize::normalize;
/// Capture, sequencing and abstract policies.
pub use policy::{AbstractPolicy, CapturePolicy, LineWindow, RecentPolicy, SequencePolicy};
/// Per-timestamp sequence allocation.
pub use sequence::SequenceAllocator;
/// Memory service and its reports.
pub use service::{
    AbstractRecall, AbstractUpdate, MemoryService, MemoryServiceBuilder, NO_ABSTRACT, NO_RECENT,
    RawMessage, RecentMemories, SaveReport, WriteStatus,
};
/// SQLite-backed store.
pub use sqlite::SqliteMemoryStore;
/// Storage interface.
pub use store::{MemoryStore, SchemaInfo};
