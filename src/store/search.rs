use super::{map_memory_row, schema, Store};
use crate::types::Memory;
use anyhow::Result;
use rusqlite::params;

/// FTS5 metacharacters stripped from user tokens. Anything that survives is
/// wrapped in double quotes (with embedded quotes doubled) so the query
/// language sees only phrase terms, never operators.
const FTS_METACHARS: &[char] = &['*', '^', '{', '}', '[', ']', '(', ')', ':', '~', '!'];

/// Sanitize free text into an FTS5 MATCH expression: whitespace-split, drop
/// one-character tokens, strip metacharacters, quote each survivor, join
/// with OR. Returns an empty string when nothing survives.
pub fn sanitize_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .map(|token| {
            token
                .chars()
                .filter(|c| !FTS_METACHARS.contains(c))
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl Store {
    /// Keyword search over the FTS index, optionally scoped to a project.
    ///
    /// A query the sanitizer empties returns no rows; a MATCH expression the
    /// index still rejects returns no rows as well. Search never raises on
    /// user input.
    pub fn search(&self, query: &str, project: Option<&str>, limit: usize) -> Result<Vec<Memory>> {
        let match_expr = sanitize_match_query(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let limit = i64::try_from(limit)?;

        let result: rusqlite::Result<Vec<Memory>> = (|| {
            if let Some(project) = project {
                let sql = format!(
                    "SELECT {} FROM memories m
                     JOIN memories_fts f ON f.rowid = m.id
                     WHERE memories_fts MATCH ?1 AND m.project = ?2
                     ORDER BY rank LIMIT ?3",
                    schema::MEMORY_COLUMNS_QUALIFIED
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params![match_expr, project, limit], map_memory_row)?;
                rows.collect()
            } else {
                let sql = format!(
                    "SELECT {} FROM memories m
                     JOIN memories_fts f ON f.rowid = m.id
                     WHERE memories_fts MATCH ?1
                     ORDER BY rank LIMIT ?2",
                    schema::MEMORY_COLUMNS_QUALIFIED
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params![match_expr, limit], map_memory_row)?;
                rows.collect()
            }
        })();

        match result {
            Ok(memories) => Ok(memories),
            Err(err) => {
                // A hostile expression that slipped through sanitation is a
                // degraded search, not a failure.
                tracing::debug!("fts query rejected: {err}");
                Ok(Vec::new())
            }
        }
    }
}
