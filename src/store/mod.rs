//! Durable storage: memories with their FTS mirror, checkpoints, sessions,
//! and the meta table. The store exclusively owns the database handle; it is
//! the only component that mutates rows, and every public operation runs as
//! a single transaction.

mod checkpoints;
mod schema;
mod search;
mod stats;

pub use search::sanitize_match_query;
pub use stats::{ListParams, MemoryPage, ScoreHistogram, StoreStats, TimelinePoint};

use crate::config::ContextConfig;
use crate::error::StoreError;
use crate::types::{Memory, NewMemory};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at `path`.
    ///
    /// WAL journaling plus a 5-second busy timeout let concurrent hook
    /// processes overlap reads and serialize writes with short waits instead
    /// of surfacing contention errors. If bootstrap fails the connection is
    /// dropped before the error propagates.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| StoreError::Open {
                path: path.display().to_string(),
                message: format!("create parent directory: {err}"),
            })?;
        }
        let conn = Connection::open(path).map_err(|err| StoreError::Open {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::initialize(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|err| StoreError::Open {
            path: ":memory:".into(),
            message: err.to_string(),
        })?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(StoreError::Sqlite)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8192;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(StoreError::Sqlite)?;
        schema::bootstrap(&conn).map_err(|err| StoreError::Bootstrap(err.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|err| anyhow!("store lock poisoned: {err}"))
    }

    // ── Memories ─────────────────────────────────────────────────────────

    /// Insert one memory. Returns `None` without inserting when another row
    /// already carries the same source hash.
    pub fn insert_memory(&self, memory: &NewMemory) -> Result<Option<i64>> {
        let conn = self.conn()?;
        insert_memory_inner(&conn, memory)
    }

    /// Insert a batch under a single transaction. Duplicates count as zero;
    /// a failed row rolls back the whole batch.
    pub fn insert_many(&self, memories: &[NewMemory]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().context("begin insert batch")?;
        let mut inserted = 0;
        for memory in memories {
            if insert_memory_inner(&tx, memory)?.is_some() {
                inserted += 1;
            }
        }
        tx.commit().context("commit insert batch")?;
        Ok(inserted)
    }

    pub fn get_memory(&self, id: i64) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM memories WHERE id = ?1",
            schema::MEMORY_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.query_row(params![id], map_memory_row)
            .optional()
            .context("fetch memory by id")
    }

    /// Highest-base-score memories for a project.
    pub fn top_memories(&self, project: &str, limit: usize) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM memories WHERE project = ?1
             ORDER BY score DESC, id DESC LIMIT ?2",
            schema::MEMORY_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project, i64::try_from(limit)?], map_memory_row)?;
        rows.map(|r| r.context("read memory row")).collect()
    }

    /// Score/access bookkeeping applied when memories are restored or
    /// recalled: bump the access count, refresh `last_accessed`, and nudge
    /// the score asymptotically toward (never past) 1.
    pub fn touch_memories(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().context("begin touch")?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE memories
                 SET access_count = access_count + 1,
                     last_accessed = ?1,
                     score = MIN(1.0, score + 0.02 * (1.0 - score))
                 WHERE id = ?2",
            )?;
            for id in ids {
                stmt.execute(params![now, id])?;
            }
        }
        tx.commit().context("commit touch")?;
        Ok(())
    }

    /// Decay idle scores, then delete everything below the prune threshold.
    /// Returns the number of deleted rows.
    pub fn decay_and_prune(&self, config: &ContextConfig) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().context("begin decay")?;
        #[allow(clippy::cast_possible_truncation)]
        let interval_days = (config.decay_interval_days.round() as i64).max(1);
        let cutoff = (Utc::now() - Duration::days(interval_days)).to_rfc3339();
        tx.execute(
            "UPDATE memories SET score = MAX(?1, score * ?2) WHERE last_accessed < ?3",
            params![config.score_floor, config.decay_factor, cutoff],
        )
        .context("decay idle scores")?;
        let deleted = tx
            .execute(
                "DELETE FROM memories WHERE score < ?1",
                params![config.prune_threshold],
            )
            .context("prune decayed memories")?;
        tx.commit().context("commit decay")?;
        Ok(deleted)
    }

    /// Delete never-touched memories older than `days` (default 30, min 1).
    pub fn prune_old(&self, days: Option<f64>) -> Result<usize> {
        let conn = self.conn()?;
        let cutoff = age_cutoff(days);
        conn.execute(
            "DELETE FROM memories WHERE created_at < ?1 AND access_count = 0",
            params![cutoff],
        )
        .context("prune old memories")
    }

    pub fn count_old(&self, days: Option<f64>) -> Result<i64> {
        let conn = self.conn()?;
        let cutoff = age_cutoff(days);
        conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE created_at < ?1 AND access_count = 0",
            params![cutoff],
            |row| row.get(0),
        )
        .context("count old memories")
    }

    pub fn prune_below_score(&self, threshold: f64) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM memories WHERE score < ?1", params![threshold])
            .context("prune below score")
    }

    pub fn count_below_score(&self, threshold: f64) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE score < ?1",
            params![threshold],
            |row| row.get(0),
        )
        .context("count below score")
    }

    /// Enforce the per-project retention cap by deleting the lowest-score
    /// rows beyond it. Returns the number deleted.
    pub fn enforce_project_limit(&self, project: &str, max_memories: usize) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memories WHERE project = ?1",
            params![project],
            |row| row.get(0),
        )?;
        let max = i64::try_from(max_memories)?;
        if count <= max {
            return Ok(0);
        }
        conn.execute(
            "DELETE FROM memories WHERE id IN (
                 SELECT id FROM memories WHERE project = ?1
                 ORDER BY score ASC, id ASC LIMIT ?2
             )",
            params![project, count - max],
        )
        .context("enforce project limit")
    }

    pub fn delete_memory(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    pub fn delete_memories(&self, ids: &[i64]) -> Result<usize> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().context("begin bulk delete")?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM memories WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit().context("commit bulk delete")?;
        Ok(deleted)
    }

    /// All memories, optionally scoped to a project, newest first. Feeds the
    /// CLI export command.
    pub fn export_memories(&self, project: Option<&str>) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        let rows = if let Some(project) = project {
            let sql = format!(
                "SELECT {} FROM memories WHERE project = ?1 ORDER BY id ASC",
                schema::MEMORY_COLUMNS
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params![project], map_memory_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            let sql = format!(
                "SELECT {} FROM memories ORDER BY id ASC",
                schema::MEMORY_COLUMNS
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map([], map_memory_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }
}

fn insert_memory_inner(conn: &Connection, memory: &NewMemory) -> Result<Option<i64>> {
    let now = Utc::now().to_rfc3339();
    // Serialized exactly once here; callers hand over structured values.
    let metadata = memory
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("serialize memory metadata")?;
    let score = memory.score.unwrap_or(0.5).clamp(0.0, 1.0);
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO memories
                 (project, session_id, category, content, keywords, score,
                  created_at, last_accessed, access_count, source_hash, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, ?8, ?9)",
            params![
                memory.project,
                memory.session_id,
                memory.category.as_str(),
                memory.content,
                memory.keywords,
                score,
                now,
                memory.source_hash,
                metadata,
            ],
        )
        .context("insert memory")?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

fn age_cutoff(days: Option<f64>) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let days = days
        .filter(|d| d.is_finite())
        .map_or(30, |d| (d.round() as i64).max(1));
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Memory> {
    let metadata_raw: Option<String> = row.get(11)?;
    let metadata = metadata_raw
        .map(|value| {
            serde_json::from_str::<serde_json::Value>(&value).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    11,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })
        })
        .transpose()?;

    Ok(Memory {
        id: row.get(0)?,
        project: row.get(1)?,
        session_id: row.get(2)?,
        category: row.get(3)?,
        content: row.get(4)?,
        keywords: row.get(5)?,
        score: row.get(6)?,
        created_at: row.get(7)?,
        last_accessed: row.get(8)?,
        access_count: row.get(9)?,
        source_hash: row.get(10)?,
        metadata,
    })
}

#[cfg(test)]
pub(crate) fn test_memory(project: &str, category: crate::types::MemoryCategory) -> NewMemory {
    NewMemory {
        project: project.to_string(),
        session_id: "sess-1".to_string(),
        category,
        content: format!("{category} content for tests"),
        keywords: "content tests".to_string(),
        score: Some(0.5),
        source_hash: None,
        metadata: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryCategory;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn hashed(project: &str, hash: &str, score: f64) -> NewMemory {
        NewMemory {
            source_hash: Some(hash.to_string()),
            score: Some(score),
            ..test_memory(project, MemoryCategory::Note)
        }
    }

    #[test]
    fn insert_returns_id_and_dedups_on_hash() {
        let store = store();
        let memory = hashed("/proj", "abcd1234abcd1234", 0.5);

        let first = store.insert_memory(&memory).unwrap();
        let second = store.insert_memory(&memory).unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        let page = store
            .list_memories(&ListParams::default())
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn null_hash_disables_dedup() {
        let store = store();
        let memory = test_memory("/proj", MemoryCategory::Note);
        assert!(store.insert_memory(&memory).unwrap().is_some());
        assert!(store.insert_memory(&memory).unwrap().is_some());
    }

    #[test]
    fn insert_many_counts_only_new_rows() {
        let store = store();
        let batch = vec![
            hashed("/proj", "hash-a", 0.5),
            hashed("/proj", "hash-b", 0.5),
            hashed("/proj", "hash-c", 0.5),
        ];

        assert_eq!(store.insert_many(&batch).unwrap(), 3);
        assert_eq!(store.insert_many(&batch).unwrap(), 0);
        assert_eq!(store.stats().unwrap().total, 3);
    }

    #[test]
    fn metadata_round_trips_without_double_encoding() {
        let store = store();
        let memory = NewMemory {
            metadata: Some(serde_json::json!({"a": 1})),
            ..test_memory("/proj", MemoryCategory::Note)
        };
        let id = store.insert_memory(&memory).unwrap().unwrap();

        let loaded = store.get_memory(id).unwrap().unwrap();
        assert_eq!(loaded.metadata, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn score_clamps_into_unit_interval() {
        let store = store();
        let memory = NewMemory {
            score: Some(7.5),
            ..test_memory("/proj", MemoryCategory::Note)
        };
        let id = store.insert_memory(&memory).unwrap().unwrap();
        assert_eq!(store.get_memory(id).unwrap().unwrap().score, 1.0);
    }

    #[test]
    fn missing_score_defaults_to_half() {
        let store = store();
        let memory = NewMemory {
            score: None,
            ..test_memory("/proj", MemoryCategory::Note)
        };
        let id = store.insert_memory(&memory).unwrap().unwrap();
        assert_eq!(store.get_memory(id).unwrap().unwrap().score, 0.5);
    }

    #[test]
    fn top_memories_orders_by_score() {
        let store = store();
        store.insert_memory(&hashed("/proj", "low", 0.2)).unwrap();
        store.insert_memory(&hashed("/proj", "high", 0.9)).unwrap();
        store.insert_memory(&hashed("/proj", "mid", 0.5)).unwrap();
        store.insert_memory(&hashed("/other", "other", 0.99)).unwrap();

        let top = store.top_memories("/proj", 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].score, 0.9);
        assert_eq!(top[1].score, 0.5);
    }

    #[test]
    fn touch_bumps_access_and_score_asymptotically() {
        let store = store();
        let id = store
            .insert_memory(&hashed("/proj", "touched", 0.5))
            .unwrap()
            .unwrap();

        store.touch_memories(&[id]).unwrap();
        let once = store.get_memory(id).unwrap().unwrap();
        assert_eq!(once.access_count, 1);
        assert!((once.score - 0.51).abs() < 1e-9);

        for _ in 0..500 {
            store.touch_memories(&[id]).unwrap();
        }
        let many = store.get_memory(id).unwrap().unwrap();
        assert!(many.score <= 1.0);
        assert_eq!(many.access_count, 501);
    }

    #[test]
    fn touch_of_missing_ids_is_a_silent_noop() {
        let store = store();
        store.touch_memories(&[12345]).unwrap();
    }

    #[test]
    fn decay_and_prune_respects_floor_and_threshold() {
        let store = store();
        let keep = store
            .insert_memory(&hashed("/proj", "keep", 0.9))
            .unwrap()
            .unwrap();
        let drop = store
            .insert_memory(&hashed("/proj", "drop", 0.04))
            .unwrap()
            .unwrap();
        // Backdate both so the idle cutoff applies.
        {
            let conn = store.conn().unwrap();
            let old = (Utc::now() - Duration::days(10)).to_rfc3339();
            conn.execute("UPDATE memories SET last_accessed = ?1", params![old])
                .unwrap();
        }

        let config = ContextConfig::default();
        let deleted = store.decay_and_prune(&config).unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_memory(drop).unwrap().is_none());

        let kept = store.get_memory(keep).unwrap().unwrap();
        assert!((kept.score - 0.9 * 0.95).abs() < 1e-9);
    }

    #[test]
    fn decay_skips_recently_accessed_rows() {
        let store = store();
        let id = store
            .insert_memory(&hashed("/proj", "fresh", 0.8))
            .unwrap()
            .unwrap();
        store.decay_and_prune(&ContextConfig::default()).unwrap();
        assert_eq!(store.get_memory(id).unwrap().unwrap().score, 0.8);
    }

    #[test]
    fn prune_old_only_removes_untouched_rows() {
        let store = store();
        let untouched = store
            .insert_memory(&hashed("/proj", "untouched", 0.5))
            .unwrap()
            .unwrap();
        let touched = store
            .insert_memory(&hashed("/proj", "touched", 0.5))
            .unwrap()
            .unwrap();
        store.touch_memories(&[touched]).unwrap();
        {
            let conn = store.conn().unwrap();
            let old = (Utc::now() - Duration::days(90)).to_rfc3339();
            conn.execute("UPDATE memories SET created_at = ?1", params![old])
                .unwrap();
        }

        assert_eq!(store.count_old(Some(30.0)).unwrap(), 1);
        assert_eq!(store.prune_old(Some(30.0)).unwrap(), 1);
        assert!(store.get_memory(untouched).unwrap().is_none());
        assert!(store.get_memory(touched).unwrap().is_some());
    }

    #[test]
    fn project_limit_drops_lowest_scores_first() {
        let store = store();
        for i in 0..10 {
            #[allow(clippy::cast_precision_loss)]
            let memory = hashed("/proj", &format!("h{i}"), f64::from(i) / 10.0);
            store.insert_memory(&memory).unwrap();
        }

        let deleted = store.enforce_project_limit("/proj", 6).unwrap();
        assert_eq!(deleted, 4);

        let survivors = store.top_memories("/proj", 10).unwrap();
        assert_eq!(survivors.len(), 6);
        assert!(survivors.iter().all(|m| m.score >= 0.4));
    }

    #[test]
    fn delete_memory_returns_whether_it_existed() {
        let store = store();
        let id = store
            .insert_memory(&test_memory("/proj", MemoryCategory::Note))
            .unwrap()
            .unwrap();
        assert!(store.delete_memory(id).unwrap());
        assert!(!store.delete_memory(id).unwrap());
    }

    #[test]
    fn bulk_delete_counts_removed_rows() {
        let store = store();
        let a = store
            .insert_memory(&hashed("/proj", "a", 0.5))
            .unwrap()
            .unwrap();
        let b = store
            .insert_memory(&hashed("/proj", "b", 0.5))
            .unwrap()
            .unwrap();
        assert_eq!(store.delete_memories(&[a, b, 999]).unwrap(), 2);
    }
}
