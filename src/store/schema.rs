use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

pub(super) const SCHEMA_VERSION: &str = "1";

/// Column list shared by every memory SELECT.
pub(super) const MEMORY_COLUMNS: &str = "id, project, session_id, category, content, keywords, \
     score, created_at, last_accessed, access_count, source_hash, metadata";

/// The same columns qualified for joins against the FTS table.
pub(super) const MEMORY_COLUMNS_QUALIFIED: &str =
    "m.id, m.project, m.session_id, m.category, m.content, m.keywords, \
     m.score, m.created_at, m.last_accessed, m.access_count, m.source_hash, m.metadata";

/// Create all tables, indexes, the FTS mirror, and its lockstep triggers.
/// Gated on `meta.schema_version` so reopening an initialized store is a
/// cheap no-op.
pub(super) fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
             key   TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );",
    )
    .context("create meta table")?;

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("read schema version")?;
    if version.as_deref() == Some(SCHEMA_VERSION) {
        return Ok(());
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
             id            INTEGER PRIMARY KEY AUTOINCREMENT,
             project       TEXT NOT NULL,
             session_id    TEXT,
             category      TEXT NOT NULL,
             content       TEXT NOT NULL,
             keywords      TEXT NOT NULL DEFAULT '',
             score         REAL NOT NULL DEFAULT 0.5,
             created_at    TEXT NOT NULL,
             last_accessed TEXT NOT NULL,
             access_count  INTEGER NOT NULL DEFAULT 0,
             source_hash   TEXT,
             metadata      TEXT
         );
         CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_source_hash
             ON memories(source_hash) WHERE source_hash IS NOT NULL;
         CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project);
         CREATE INDEX IF NOT EXISTS idx_memories_project_score
             ON memories(project, score DESC);

         CREATE TABLE IF NOT EXISTS checkpoints (
             id              INTEGER PRIMARY KEY AUTOINCREMENT,
             session_id      TEXT NOT NULL,
             transcript_path TEXT NOT NULL,
             last_line       INTEGER NOT NULL,
             created_at      TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_checkpoints_session
             ON checkpoints(session_id);

         CREATE TABLE IF NOT EXISTS sessions (
             session_id       TEXT PRIMARY KEY,
             project          TEXT NOT NULL,
             started_at       TEXT NOT NULL,
             ended_at         TEXT,
             memories_created INTEGER NOT NULL DEFAULT 0,
             compactions      INTEGER NOT NULL DEFAULT 0
         );

         CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
             content, keywords, content=memories, content_rowid=id
         );
         CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
             INSERT INTO memories_fts(rowid, content, keywords)
             VALUES (new.id, new.content, new.keywords);
         END;
         CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
             INSERT INTO memories_fts(memories_fts, rowid, content, keywords)
             VALUES ('delete', old.id, old.content, old.keywords);
         END;
         CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
             INSERT INTO memories_fts(memories_fts, rowid, content, keywords)
             VALUES ('delete', old.id, old.content, old.keywords);
             INSERT INTO memories_fts(rowid, content, keywords)
             VALUES (new.id, new.content, new.keywords);
         END;",
    )
    .context("initialize memory schema")?;

    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [SCHEMA_VERSION],
    )
    .context("record schema version")?;
    Ok(())
}

#[cfg(test)]
pub(super) fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table') AND name = ?1",
            rusqlite::params![table_name],
            |row| row.get(0),
        )
        .context("check schema table existence")?;
    Ok(count == 1)
}
