use super::Store;
use crate::types::{Checkpoint, SessionRow};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

impl Store {
    // ── Checkpoints ──────────────────────────────────────────────────────

    /// Record a new parser cursor. Rows are append-only; the effective
    /// checkpoint is the one with the greatest id.
    pub fn save_checkpoint(
        &self,
        session_id: &str,
        transcript_path: &str,
        last_line: u64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checkpoints (session_id, transcript_path, last_line, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                transcript_path,
                i64::try_from(last_line)?,
                Utc::now().to_rfc3339()
            ],
        )
        .context("save checkpoint")?;
        Ok(())
    }

    pub fn checkpoint(
        &self,
        session_id: &str,
        transcript_path: &str,
    ) -> Result<Option<Checkpoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, session_id, transcript_path, last_line, created_at
             FROM checkpoints
             WHERE session_id = ?1 AND transcript_path = ?2
             ORDER BY id DESC LIMIT 1",
        )?;
        stmt.query_row(params![session_id, transcript_path], |row| {
            let last_line: i64 = row.get(3)?;
            Ok(Checkpoint {
                id: row.get(0)?,
                session_id: row.get(1)?,
                transcript_path: row.get(2)?,
                last_line: u64::try_from(last_line).unwrap_or(0),
                created_at: row.get(4)?,
            })
        })
        .optional()
        .context("read checkpoint")
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Create the session row or refresh its project. A session that was
    /// ended comes back as the same row on its next run.
    pub fn upsert_session(&self, session_id: &str, project: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (session_id, project, started_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET project = excluded.project",
            params![session_id, project, Utc::now().to_rfc3339()],
        )
        .context("upsert session")?;
        Ok(())
    }

    pub fn incr_session_memories(&self, session_id: &str, count: usize) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sessions SET memories_created = memories_created + ?1
             WHERE session_id = ?2",
            params![i64::try_from(count)?, session_id],
        )
        .context("bump session memory counter")?;
        Ok(())
    }

    pub fn incr_session_compactions(&self, session_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sessions SET compactions = compactions + 1 WHERE session_id = ?1",
            params![session_id],
        )
        .context("bump session compaction counter")?;
        Ok(())
    }

    pub fn end_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sessions SET ended_at = ?1 WHERE session_id = ?2",
            params![Utc::now().to_rfc3339(), session_id],
        )
        .context("end session")?;
        Ok(())
    }

    pub fn all_sessions(&self) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT session_id, project, started_at, ended_at, memories_created, compactions
             FROM sessions ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionRow {
                session_id: row.get(0)?,
                project: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                memories_created: row.get(4)?,
                compactions: row.get(5)?,
            })
        })?;
        rows.map(|r| r.context("read session row")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn latest_checkpoint_wins() {
        let store = store();
        store.save_checkpoint("sess", "/t.jsonl", 10).unwrap();
        store.save_checkpoint("sess", "/t.jsonl", 50).unwrap();
        store.save_checkpoint("sess", "/t.jsonl", 100).unwrap();

        let checkpoint = store.checkpoint("sess", "/t.jsonl").unwrap().unwrap();
        assert_eq!(checkpoint.last_line, 100);
    }

    #[test]
    fn checkpoints_are_independent_per_path() {
        let store = store();
        store.save_checkpoint("sess", "/a.jsonl", 10).unwrap();
        store.save_checkpoint("sess", "/b.jsonl", 99).unwrap();

        assert_eq!(
            store.checkpoint("sess", "/a.jsonl").unwrap().unwrap().last_line,
            10
        );
        assert_eq!(
            store.checkpoint("sess", "/b.jsonl").unwrap().unwrap().last_line,
            99
        );
        assert!(store.checkpoint("sess", "/c.jsonl").unwrap().is_none());
    }

    #[test]
    fn a_checkpoint_can_move_backwards_after_rollback() {
        let store = store();
        store.save_checkpoint("sess", "/t.jsonl", 10).unwrap();
        store.save_checkpoint("sess", "/t.jsonl", 4).unwrap();
        assert_eq!(
            store.checkpoint("sess", "/t.jsonl").unwrap().unwrap().last_line,
            4
        );
    }

    #[test]
    fn session_lifecycle_upsert_count_end_resume() {
        let store = store();
        store.upsert_session("sess-1", "/proj").unwrap();
        store.incr_session_memories("sess-1", 3).unwrap();
        store.incr_session_compactions("sess-1").unwrap();
        store.end_session("sess-1").unwrap();

        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].memories_created, 3);
        assert_eq!(sessions[0].compactions, 1);
        assert!(sessions[0].ended_at.is_some());

        // A new run of the same session reuses the row.
        store.upsert_session("sess-1", "/proj-moved").unwrap();
        let sessions = store.all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].project, "/proj-moved");
        assert_eq!(sessions[0].memories_created, 3);
    }

    #[test]
    fn counter_updates_on_missing_sessions_are_noops() {
        let store = store();
        store.incr_session_memories("ghost", 5).unwrap();
        store.incr_session_compactions("ghost").unwrap();
        store.end_session("ghost").unwrap();
        assert!(store.all_sessions().unwrap().is_empty());
    }
}
