//! Storage interface for memory records and the running abstract.

use crate::error::MemoryError;
use crate::model::{AbstractRecord, ColumnInfo, MemoryRecord, MemoryStats, NewMemory, SaveOutcome};
use async_trait::async_trait;
use log::warn;
use std::collections::BTreeMap;

/// Table name to column listing.
pub type SchemaInfo = BTreeMap<String, Vec<ColumnInfo>>;

#[async_trait]
/// Durable record store used by the memory service.
///
/// Message queries return at most [`crate::policy::MESSAGE_QUERY_LIMIT`] rows,
/// oldest first, ordered by `(timestamp, sequence)`.
pub trait MemoryStore: Send + Sync {
    /// Insert a record; an existing `(timestamp, sequence)` key is a no-op.
    async fn save(&self, memory: NewMemory) -> Result<SaveOutcome, MemoryError>;

    /// The most recently updated abstract, if any.
    async fn latest_abstract(&self) -> Result<Option<AbstractRecord>, MemoryError>;

    /// Replace the abstract content and watermark.
    async fn upsert_abstract(
        &self,
        content: &str,
        last_processed_timestamp: i64,
    ) -> Result<AbstractRecord, MemoryError>;

    /// Records with a timestamp strictly greater than `timestamp`.
    async fn messages_after(&self, timestamp: i64) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Records from the last `max_days` days.
    async fn messages_in_window(&self, max_days: u32) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Aggregate counts.
    async fn stats(&self) -> Result<MemoryStats, MemoryError>;

    /// Column listing for every table.
    async fn schema(&self) -> Result<SchemaInfo, MemoryError> {
        Ok(SchemaInfo::new())
    }
}

/// Degrade a failed read to its empty value, logging the fault.
pub(crate) fn degrade<T: Default>(operation: &str, result: Result<T, MemoryError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("memory store read failed; returning empty result (operation={operation}): {err}");
            T::default()
        }
    }
}
