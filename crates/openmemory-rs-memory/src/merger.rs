//! Incremental merge and full rebuild of the running abstract.
//!
//! With an existing abstract the merger folds only records newer than its
//! watermark into it, showing the earliest of the new lines. Without one, or
//! when the caller forces a refresh, it rebuilds from the lookback window and
//! shows the latest lines. Both windows come from [`AbstractPolicy`].

use crate::format::format_record;
use crate::model::{AbstractRecord, MemoryRecord};
use crate::policy::AbstractPolicy;
use crate::store::{MemoryStore, degrade};
use log::{debug, error, info};
use std::fmt::Debug;
use std::sync::Arc;

/// Returned when a rebuild finds no history at all.
pub const NO_HISTORY: &str = "No previous conversations found.";

/// Produces abstract text from formatted message lines.
///
/// Lines arrive already windowed; implementations only decide the prose.
pub trait AbstractComposer: Send + Sync + Debug {
    /// Fold new activity into a previous abstract.
    fn merge(&self, previous: &str, lines: &[String]) -> String;

    /// Build a fresh abstract; `total` counts every record considered.
    fn rebuild(&self, total: usize, lines: &[String]) -> String;
}

/// Fixed-template composer used when no summarizer is plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateComposer;

impl AbstractComposer for TemplateComposer {
    fn merge(&self, previous: &str, lines: &[String]) -> String {
        format!(
            "Previous Summary:\n{previous}\n\nRecent Activity:\n{}\n\n\
             Combined Understanding: The conversation continues with recent interactions \
             building upon the previous context.",
            lines.join("\n")
        )
    }

    fn rebuild(&self, total: usize, lines: &[String]) -> String {
        format!(
            "Conversation Summary ({total} total messages):\n\nRecent Activity:\n{}\n\n\
             This represents the stored conversation history for this user and agent.",
            lines.join("\n")
        )
    }
}

/// Which path produced an abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// An abstract existed and nothing new arrived.
    Unchanged,
    /// New records were folded into the existing abstract.
    Incremental,
    /// The abstract was rebuilt from the lookback window.
    Rebuilt,
    /// A rebuild found no records.
    Empty,
}

/// Result of a merge pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractOutcome {
    /// Abstract text handed back to the caller.
    pub content: String,
    /// Path taken.
    pub mode: MergeMode,
    /// Watermark after this pass, when one exists.
    pub watermark: Option<i64>,
    /// The stored abstract row; `None` when nothing was written or the write failed.
    pub record: Option<AbstractRecord>,
}

/// Decides between incremental merge and full rebuild.
#[derive(Debug, Clone)]
pub struct AbstractMerger {
    policy: AbstractPolicy,
    composer: Arc<dyn AbstractComposer>,
}

impl Default for AbstractMerger {
    fn default() -> Self {
        Self::new(AbstractPolicy::default(), Arc::new(TemplateComposer))
    }
}

impl AbstractMerger {
    /// Create a merger with an explicit policy and composer.
    pub fn new(policy: AbstractPolicy, composer: Arc<dyn AbstractComposer>) -> Self {
        Self { policy, composer }
    }

    /// Active policy.
    pub fn policy(&self) -> &AbstractPolicy {
        &self.policy
    }

    /// Produce the current abstract, persisting it when it changed.
    pub async fn run(&self, store: &dyn MemoryStore, force_refresh: bool) -> AbstractOutcome {
        let existing = if force_refresh {
            None
        } else {
            degrade("latest_abstract", store.latest_abstract().await)
        };
        match existing {
            Some(current) => self.incremental(store, current).await,
            None => self.rebuild(store).await,
        }
    }

    async fn incremental(&self, store: &dyn MemoryStore, current: AbstractRecord) -> AbstractOutcome {
        let watermark = current.last_processed_timestamp;
        let pending = degrade("messages_after", store.messages_after(watermark).await);
        if pending.is_empty() {
            debug!("no new messages since watermark (watermark={watermark})");
            return AbstractOutcome {
                content: current.abstract_content.clone(),
                mode: MergeMode::Unchanged,
                watermark: Some(watermark),
                record: Some(current),
            };
        }

        info!(
            "merging new messages into abstract (count={}, watermark={watermark})",
            pending.len()
        );
        let lines = format_lines(&pending);
        let shown = self.policy.incremental_window.apply(&lines);
        let content = self.composer.merge(&current.abstract_content, shown);
        let next_watermark = max_timestamp(&pending).map_or(watermark, |max| max.max(watermark));
        self.persist(store, content, next_watermark, MergeMode::Incremental)
            .await
    }

    async fn rebuild(&self, store: &dyn MemoryStore) -> AbstractOutcome {
        let days = self.policy.lookback_days;
        let history = degrade("messages_in_window", store.messages_in_window(days).await);
        let Some(watermark) = max_timestamp(&history) else {
            info!("no messages in lookback window (days={days})");
            return AbstractOutcome {
                content: NO_HISTORY.to_string(),
                mode: MergeMode::Empty,
                watermark: None,
                record: None,
            };
        };

        info!("rebuilding abstract (count={}, days={days})", history.len());
        let lines = format_lines(&history);
        let shown = self.policy.rebuild_window.apply(&lines);
        let content = self.composer.rebuild(history.len(), shown);
        self.persist(store, content, watermark, MergeMode::Rebuilt)
            .await
    }

    async fn persist(
        &self,
        store: &dyn MemoryStore,
        content: String,
        watermark: i64,
        mode: MergeMode,
    ) -> AbstractOutcome {
        let record = match store.upsert_abstract(&content, watermark).await {
            Ok(record) => Some(record),
            Err(err) => {
                error!("failed to persist memory abstract (watermark={watermark}): {err}");
                None
            }
        };
        AbstractOutcome {
            content,
            mode,
            watermark: Some(watermark),
            record,
        }
    }
}

fn format_lines(records: &[MemoryRecord]) -> Vec<String> {
    records.iter().map(format_record).collect()
}

fn max_timestamp(records: &[MemoryRecord]) -> Option<i64> {
    records.iter().map(|record| record.timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::{AbstractComposer, AbstractMerger, MergeMode, NO_HISTORY, TemplateComposer};
    use crate::clock::ManualClock;
    use crate::model::NewMemory;
    use crate::policy::{AbstractPolicy, LineWindow};
    use crate::sqlite::SqliteMemoryStore;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn store() -> SqliteMemoryStore {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        SqliteMemoryStore::open_in_memory_with_clock(clock).expect("store")
    }

    async fn seed(store: &SqliteMemoryStore, first: i64, count: i64) {
        for index in 0..count {
            store
                .save(NewMemory {
                    speaker: "user".to_string(),
                    message: format!("message {index}"),
                    timestamp: first + index,
                    sequence: 0,
                })
                .await
                .expect("save");
        }
    }

    fn activity(content: &str) -> Vec<&str> {
        let start = content.find("Recent Activity:\n").expect("section") + "Recent Activity:\n".len();
        let rest = &content[start..];
        let end = rest.find("\n\n").unwrap_or(rest.len());
        rest[..end].lines().collect()
    }

    #[tokio::test]
    async fn empty_rebuild_returns_sentinel_without_write() {
        let store = store();
        let outcome = AbstractMerger::default().run(&store, false).await;
        assert_eq!(outcome.content, NO_HISTORY);
        assert_eq!(outcome.mode, MergeMode::Empty);
        assert_eq!(outcome.record, None);
        assert_eq!(store.stats().await.expect("stats").abstract_count, 0);
    }

    #[tokio::test]
    async fn rebuild_keeps_last_five_lines() {
        let store = store();
        seed(&store, NOW - 100, 8).await;

        let outcome = AbstractMerger::default().run(&store, false).await;
        assert_eq!(outcome.mode, MergeMode::Rebuilt);
        assert_eq!(outcome.watermark, Some(NOW - 93));
        assert!(outcome.content.starts_with("Conversation Summary (8 total messages):"));
        let lines = activity(&outcome.content);
        assert_eq!(lines.len(), 5);
        assert!(lines[0].ends_with("User: message 3"));
        assert!(lines[4].ends_with("User: message 7"));

        let stored = store.latest_abstract().await.expect("latest").expect("row");
        assert_eq!(stored.abstract_content, outcome.content);
        assert_eq!(stored.last_processed_timestamp, NOW - 93);
    }

    #[tokio::test]
    async fn incremental_keeps_first_ten_of_twelve() {
        let store = store();
        store.upsert_abstract("earlier summary", NOW - 50).await.expect("seed");
        seed(&store, NOW - 40, 12).await;

        let outcome = AbstractMerger::default().run(&store, false).await;
        assert_eq!(outcome.mode, MergeMode::Incremental);
        assert_eq!(outcome.watermark, Some(NOW - 29));
        assert!(outcome.content.starts_with("Previous Summary:\nearlier summary\n\n"));
        let lines = activity(&outcome.content);
        assert_eq!(lines.len(), 10);
        assert!(lines[0].ends_with("User: message 0"));
        assert!(lines[9].ends_with("User: message 9"));
        assert!(!outcome.content.contains("message 10"));

        let stored = store.latest_abstract().await.expect("latest").expect("row");
        assert_eq!(stored.last_processed_timestamp, NOW - 29);
    }

    #[tokio::test]
    async fn incremental_without_new_messages_is_unchanged() {
        let store = store();
        seed(&store, NOW - 40, 3).await;
        let stored = store.upsert_abstract("kept", NOW).await.expect("seed");

        let outcome = AbstractMerger::default().run(&store, false).await;
        assert_eq!(outcome.mode, MergeMode::Unchanged);
        assert_eq!(outcome.content, "kept");
        assert_eq!(outcome.record, Some(stored.clone()));

        let latest = store.latest_abstract().await.expect("latest").expect("row");
        assert_eq!(latest.updated_at, stored.updated_at);
    }

    #[tokio::test]
    async fn watermark_never_moves_backwards() {
        let store = store();
        store.upsert_abstract("ahead", NOW - 10).await.expect("seed");
        seed(&store, NOW - 9, 2).await;

        let outcome = AbstractMerger::default().run(&store, false).await;
        assert_eq!(outcome.watermark, Some(NOW - 8));

        let again = AbstractMerger::default().run(&store, false).await;
        assert_eq!(again.mode, MergeMode::Unchanged);
        assert_eq!(again.watermark, Some(NOW - 8));
    }

    #[tokio::test]
    async fn force_refresh_ignores_existing_abstract() {
        let store = store();
        store.upsert_abstract("stale", NOW).await.expect("seed");
        seed(&store, NOW - 300, 2).await;

        let outcome = AbstractMerger::default().run(&store, true).await;
        assert_eq!(outcome.mode, MergeMode::Rebuilt);
        assert!(!outcome.content.contains("stale"));
        assert_eq!(outcome.watermark, Some(NOW - 299));
        assert_eq!(store.stats().await.expect("stats").abstract_count, 1);
    }

    #[tokio::test]
    async fn windows_are_configurable_independently() {
        let store = store();
        seed(&store, NOW - 100, 6).await;
        let policy = AbstractPolicy {
            rebuild_window: LineWindow::First(2),
            ..AbstractPolicy::default()
        };
        let merger = AbstractMerger::new(policy, Arc::new(TemplateComposer));

        let outcome = merger.run(&store, false).await;
        let lines = activity(&outcome.content);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("message 0"));
        assert_eq!(merger.policy().incremental_window, LineWindow::First(10));
    }

    #[derive(Debug)]
    struct CountingComposer;

    impl AbstractComposer for CountingComposer {
        fn merge(&self, _previous: &str, lines: &[String]) -> String {
            format!("merged {}", lines.len())
        }

        fn rebuild(&self, total: usize, lines: &[String]) -> String {
            format!("rebuilt {} of {total}", lines.len())
        }
    }

    #[tokio::test]
    async fn composer_receives_windowed_lines() {
        let store = store();
        seed(&store, NOW - 100, 7).await;
        let merger = AbstractMerger::new(AbstractPolicy::default(), Arc::new(CountingComposer));

        let rebuilt = merger.run(&store, false).await;
        assert_eq!(rebuilt.content, "rebuilt 5 of 7");

        seed(&store, NOW - 50, 15).await;
        let merged = merger.run(&store, false).await;
        assert_eq!(merged.content, "merged 10");
    }
}
