//! SQLite-backed memory store.

use crate::clock::{Clock, SystemClock};
use crate::error::MemoryError;
use crate::model::{AbstractRecord, ColumnInfo, MemoryRecord, MemoryStats, NewMemory, SaveOutcome};
use crate::policy::MESSAGE_QUERY_LIMIT;
use crate::store::{MemoryStore, SchemaInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;

/// Location string that selects a private in-memory database.
pub const IN_MEMORY_LOCATION: &str = ":memory:";

const SECONDS_PER_DAY: i64 = 86_400;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        speaker TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        sequence INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(timestamp, sequence)
    );
    CREATE TABLE IF NOT EXISTS memory_abstracts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        abstract_content TEXT NOT NULL,
        last_processed_timestamp INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp);
";

const SELECT_MEMORY_COLUMNS: &str =
    "SELECT id, speaker, message, timestamp, sequence, created_at FROM memories";

const SELECT_LATEST_ABSTRACT: &str = "
    SELECT id, abstract_content, last_processed_timestamp, created_at, updated_at
    FROM memory_abstracts
    ORDER BY updated_at DESC, id DESC
    LIMIT 1
";

/// Memory store persisting to a single SQLite database.
///
/// Statements are serialized through one connection and executed on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    location: String,
}

impl std::fmt::Debug for SqliteMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMemoryStore")
            .field("location", &self.location)
            .finish()
    }
}

impl SqliteMemoryStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open the database at `path` with an explicit time source.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY_LOCATION {
            return Self::open_in_memory_with_clock(clock);
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("sqlite journal mode set (mode={journal_mode})");
        Self::initialize(conn, clock, path.display().to_string())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::open_in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Open a private in-memory database with an explicit time source.
    pub fn open_in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, clock, IN_MEMORY_LOCATION.to_string())
    }

    fn initialize(
        conn: Connection,
        clock: Arc<dyn Clock>,
        location: String,
    ) -> Result<Self, MemoryError> {
        conn.execute_batch(CREATE_SCHEMA)?;
        info!("initialized sqlite memory store (location={location})");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
            location,
        })
    }

    /// Where the database lives.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run<T, F>(&self, task: F) -> Result<T, MemoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, MemoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            task(&mut guard)
        })
        .await?
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn save(&self, memory: NewMemory) -> Result<SaveOutcome, MemoryError> {
        let created_at = self.clock.now();
        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO memories (speaker, message, timestamp, sequence, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    memory.speaker,
                    memory.message,
                    memory.timestamp,
                    memory.sequence,
                    created_at
                ],
            )?;
            if changed > 0 {
                debug!(
                    "inserted memory (timestamp={}, sequence={})",
                    memory.timestamp, memory.sequence
                );
                Ok(SaveOutcome::Saved)
            } else {
                debug!(
                    "memory key already present (timestamp={}, sequence={})",
                    memory.timestamp, memory.sequence
                );
                Ok(SaveOutcome::Duplicate)
            }
        })
        .await
    }

    async fn latest_abstract(&self) -> Result<Option<AbstractRecord>, MemoryError> {
        self.run(|conn| {
            let record = conn
                .query_row(SELECT_LATEST_ABSTRACT, [], abstract_from_row)
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn upsert_abstract(
        &self,
        content: &str,
        last_processed_timestamp: i64,
    ) -> Result<AbstractRecord, MemoryError> {
        let content = content.to_string();
        let now = self.clock.now();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(SELECT_LATEST_ABSTRACT, [], abstract_from_row)
                .optional()?;
            let record = match existing {
                Some(current) => {
                    tx.execute(
                        "UPDATE memory_abstracts
                         SET abstract_content = ?1, last_processed_timestamp = ?2, updated_at = ?3
                         WHERE id = ?4",
                        params![content, last_processed_timestamp, now, current.id],
                    )?;
                    AbstractRecord {
                        abstract_content: content,
                        last_processed_timestamp,
                        updated_at: now,
                        ..current
                    }
                }
                None => {
                    tx.execute(
                        "INSERT INTO memory_abstracts
                         (abstract_content, last_processed_timestamp, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?3)",
                        params![content, last_processed_timestamp, now],
                    )?;
                    AbstractRecord {
                        id: tx.last_insert_rowid(),
                        abstract_content: content,
                        last_processed_timestamp,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };
            tx.commit()?;
            debug!(
                "stored memory abstract (id={}, watermark={})",
                record.id, record.last_processed_timestamp
            );
            Ok(record)
        })
        .await
    }

    async fn messages_after(&self, timestamp: i64) -> Result<Vec<MemoryRecord>, MemoryError> {
        self.run(move |conn| {
            query_memories(
                conn,
                &format!(
                    "{SELECT_MEMORY_COLUMNS} WHERE timestamp > ?1
                     ORDER BY timestamp ASC, sequence ASC LIMIT {MESSAGE_QUERY_LIMIT}"
                ),
                timestamp,
            )
        })
        .await
    }

    async fn messages_in_window(&self, max_days: u32) -> Result<Vec<MemoryRecord>, MemoryError> {
        let cutoff = self.clock.epoch_seconds() - i64::from(max_days) * SECONDS_PER_DAY;
        self.run(move |conn| {
            query_memories(
                conn,
                &format!(
                    "{SELECT_MEMORY_COLUMNS} WHERE timestamp >= ?1
                     ORDER BY timestamp ASC, sequence ASC LIMIT {MESSAGE_QUERY_LIMIT}"
                ),
                cutoff,
            )
        })
        .await
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        self.run(|conn| {
            let total_memories =
                conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
            let unique_speakers = conn.query_row(
                "SELECT COUNT(DISTINCT speaker) FROM memories",
                [],
                |row| row.get(0),
            )?;
            let abstract_count =
                conn.query_row("SELECT COUNT(*) FROM memory_abstracts", [], |row| row.get(0))?;
            Ok(MemoryStats {
                total_memories,
                unique_speakers,
                abstract_count,
            })
        })
        .await
    }

    async fn schema(&self) -> Result<SchemaInfo, MemoryError> {
        self.run(|conn| {
            let tables = {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name",
                )?;
                stmt.query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?
            };
            let mut schema = SchemaInfo::new();
            for table in tables {
                let quoted = table.replace('"', "\"\"");
                let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{quoted}\")"))?;
                let columns = stmt
                    .query_map([], |row| {
                        Ok(ColumnInfo {
                            cid: row.get(0)?,
                            name: row.get(1)?,
                            column_type: row.get(2)?,
                            notnull: row.get::<_, i64>(3)? != 0,
                            dflt_value: row.get(4)?,
                            pk: row.get::<_, i64>(5)? != 0,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                schema.insert(table, columns);
            }
            Ok(schema)
        })
        .await
    }
}

fn query_memories(
    conn: &Connection,
    sql: &str,
    bound: i64,
) -> Result<Vec<MemoryRecord>, MemoryError> {
    let mut stmt = conn.prepare(sql)?;
    let records = stmt
        .query_map([bound], memory_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    Ok(MemoryRecord {
        id: row.get(0)?,
        speaker: row.get(1)?,
        message: row.get(2)?,
        timestamp: row.get(3)?,
        sequence: row.get(4)?,
        created_at: row
            .get::<_, Option<DateTime<Utc>>>(5)?
            .unwrap_or_default(),
    })
}

fn abstract_from_row(row: &Row<'_>) -> rusqlite::Result<AbstractRecord> {
    Ok(AbstractRecord {
        id: row.get(0)?,
        abstract_content: row.get(1)?,
        last_processed_timestamp: row.get(2)?,
        created_at: row
            .get::<_, Option<DateTime<Utc>>>(3)?
            .unwrap_or_default(),
        updated_at: row
            .get::<_, Option<DateTime<Utc>>>(4)?
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::SqliteMemoryStore;
    use crate::clock::ManualClock;
    use crate::model::{NewMemory, SaveOutcome};
    use crate::policy::MESSAGE_QUERY_LIMIT;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::tempdir;

    const NOW: i64 = 1_700_000_000;

    fn store() -> (SqliteMemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch(NOW));
        let store = SqliteMemoryStore::open_in_memory_with_clock(clock.clone()).expect("store");
        (store, clock)
    }

    fn memory(message: &str, timestamp: i64, sequence: u32) -> NewMemory {
        NewMemory {
            speaker: "user".to_string(),
            message: message.to_string(),
            timestamp,
            sequence,
        }
    }

    #[tokio::test]
    async fn duplicate_key_is_ignored() {
        let (store, _clock) = store();
        let first = store.save(memory("first", NOW, 0)).await.expect("save");
        let second = store.save(memory("second", NOW, 0)).await.expect("save");
        assert_eq!(first, SaveOutcome::Saved);
        assert_eq!(second, SaveOutcome::Duplicate);

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total_memories, 1);
        let records = store.messages_after(NOW - 1).await.expect("query");
        assert_eq!(records[0].message, "first");
    }

    #[tokio::test]
    async fn messages_after_is_strict_and_ordered() {
        let (store, _clock) = store();
        store.save(memory("c", NOW + 2, 0)).await.expect("save");
        store.save(memory("b", NOW + 1, 1)).await.expect("save");
        store.save(memory("a", NOW + 1, 0)).await.expect("save");
        store.save(memory("old", NOW, 0)).await.expect("save");

        let records = store.messages_after(NOW).await.expect("query");
        let messages = records
            .iter()
            .map(|record| record.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn queries_are_capped_oldest_first() {
        let (store, _clock) = store();
        for offset in 0..(MESSAGE_QUERY_LIMIT as i64 + 5) {
            store
                .save(memory("bulk message", NOW - 5_000 + offset, 0))
                .await
                .expect("save");
        }
        let after = store.messages_after(0).await.expect("query");
        assert_eq!(after.len(), MESSAGE_QUERY_LIMIT);
        assert_eq!(after[0].timestamp, NOW - 5_000);
        assert!(after.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));

        let window = store.messages_in_window(1).await.expect("query");
        assert_eq!(window.len(), MESSAGE_QUERY_LIMIT);
        assert_eq!(window[0].timestamp, NOW - 5_000);
    }

    #[tokio::test]
    async fn window_uses_clock_cutoff() {
        let (store, clock) = store();
        store
            .save(memory("too old", NOW - 3 * 86_400 - 1, 0))
            .await
            .expect("save");
        store
            .save(memory("edge", NOW - 3 * 86_400, 0))
            .await
            .expect("save");
        store.save(memory("fresh", NOW, 0)).await.expect("save");

        let records = store.messages_in_window(3).await.expect("query");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "edge");

        clock.advance(Duration::days(30));
        let records = store.messages_in_window(3).await.expect("query");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_single_abstract_row() {
        let (store, clock) = store();
        assert_eq!(store.latest_abstract().await.expect("latest"), None);

        let first = store.upsert_abstract("one", 10).await.expect("upsert");
        clock.advance(Duration::seconds(5));
        let second = store.upsert_abstract("two", 20).await.expect("upsert");

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);

        let latest = store.latest_abstract().await.expect("latest").expect("row");
        assert_eq!(latest, second);
        assert_eq!(store.stats().await.expect("stats").abstract_count, 1);
    }

    #[tokio::test]
    async fn stats_count_distinct_speakers() {
        let (store, _clock) = store();
        store.save(memory("hello", NOW, 0)).await.expect("save");
        store.save(memory("again", NOW, 1)).await.expect("save");
        store
            .save(NewMemory {
                speaker: "agent".to_string(),
                ..memory("reply", NOW, 2)
            })
            .await
            .expect("save");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.unique_speakers, 2);
        assert_eq!(stats.abstract_count, 0);
    }

    #[tokio::test]
    async fn schema_lists_both_tables() {
        let (store, _clock) = store();
        let schema = store.schema().await.expect("schema");
        let tables = schema.keys().cloned().collect::<Vec<_>>();
        assert_eq!(tables, vec!["memories", "memory_abstracts"]);

        let columns = schema["memories"]
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            columns,
            vec!["id", "speaker", "message", "timestamp", "sequence", "created_at"]
        );
        assert!(schema["memories"][0].pk);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("memory.sqlite");
        {
            let store = SqliteMemoryStore::open(&path).expect("open");
            store.save(memory("persisted", NOW, 0)).await.expect("save");
            store.upsert_abstract("summary", NOW).await.expect("upsert");
        }
        let store = SqliteMemoryStore::open(&path).expect("reopen");
        let records = store.messages_after(NOW - 1).await.expect("query");
        assert_eq!(records.len(), 1);
        let latest = store.latest_abstract().await.expect("latest").expect("row");
        assert_eq!(latest.abstract_content, "summary");
    }
}
