use super::{map_memory_row, schema, Store};
use crate::types::Memory;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::params_from_iter;
use serde::Serialize;
use std::collections::BTreeMap;

const MAX_PAGE_SIZE: usize = 200;

/// Filters for the paginated dashboard listing. Unknown sort keys fall back
/// to `score`; `limit` clamps to 200.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub project: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            project: None,
            category: None,
            search: None,
            sort: None,
            order: None,
            page: 1,
            limit: 50,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemoryPage {
    pub memories: Vec<Memory>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ScoreHistogram {
    /// Ten buckets covering [0, 1); scores of exactly 1 land in the last.
    pub buckets: [i64; 10],
}

#[derive(Debug, Serialize)]
pub struct TimelinePoint {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub total: i64,
    pub by_category: BTreeMap<String, i64>,
    pub avg_score: f64,
    pub histogram: ScoreHistogram,
    pub timeline: Vec<TimelinePoint>,
}

fn sort_column(sort: Option<&str>) -> &'static str {
    match sort {
        Some("created") => "created_at",
        Some("accessed") => "last_accessed",
        Some("access_count") => "access_count",
        Some("id") => "id",
        _ => "score",
    }
}

fn sort_direction(order: Option<&str>) -> &'static str {
    match order {
        Some(order) if order.eq_ignore_ascii_case("asc") => "ASC",
        _ => "DESC",
    }
}

impl Store {
    /// Paginated listing for the dashboard.
    pub fn list_memories(&self, params: &ListParams) -> Result<MemoryPage> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut bindings: Vec<String> = Vec::new();
        if let Some(project) = &params.project {
            conditions.push("project = ?");
            bindings.push(project.clone());
        }
        if let Some(category) = &params.category {
            conditions.push("category = ?");
            bindings.push(category.clone());
        }
        if let Some(search) = params.search.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("(content LIKE ? OR keywords LIKE ?)");
            let pattern = format!("%{}%", search.trim());
            bindings.push(pattern.clone());
            bindings.push(pattern);
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
        let page = params.page.max(1);
        let offset = (page - 1) * limit;

        let conn = self.conn()?;
        let count_sql = format!("SELECT COUNT(*) FROM memories {where_clause}");
        let total: i64 = conn.query_row(&count_sql, params_from_iter(bindings.iter()), |row| {
            row.get(0)
        })?;

        let list_sql = format!(
            "SELECT {} FROM memories {where_clause}
             ORDER BY {} {} LIMIT {limit} OFFSET {offset}",
            schema::MEMORY_COLUMNS,
            sort_column(params.sort.as_deref()),
            sort_direction(params.order.as_deref()),
        );
        let mut stmt = conn.prepare(&list_sql)?;
        let rows = stmt.query_map(params_from_iter(bindings.iter()), map_memory_row)?;
        let memories = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read memory page")?;

        Ok(MemoryPage {
            memories,
            total,
            page,
            limit,
        })
    }

    /// Distinct projects with their memory counts, largest first.
    pub fn projects(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT project, COUNT(*) FROM memories GROUP BY project ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.map(|r| r.context("read project row")).collect()
    }

    /// Aggregate statistics: totals, category counts, score average and
    /// histogram, and the 30-day creation timeline.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let (total, avg_score): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), AVG(score) FROM memories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut by_category = BTreeMap::new();
        {
            let mut stmt = conn
                .prepare_cached("SELECT category, COUNT(*) FROM memories GROUP BY category")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (category, count) = row.context("read category count")?;
                by_category.insert(category, count);
            }
        }

        let mut buckets = [0i64; 10];
        {
            let mut stmt = conn.prepare_cached(
                "SELECT CAST(MIN(score * 10.0, 9.0) AS INTEGER) AS bucket, COUNT(*)
                 FROM memories GROUP BY bucket",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (bucket, count) = row.context("read histogram bucket")?;
                if let Ok(index) = usize::try_from(bucket) {
                    if index < 10 {
                        buckets[index] = count;
                    }
                }
            }
        }

        let mut timeline = Vec::new();
        {
            let cutoff = (Utc::now() - Duration::days(30)).to_rfc3339();
            let mut stmt = conn.prepare_cached(
                "SELECT substr(created_at, 1, 10) AS day, COUNT(*)
                 FROM memories WHERE created_at >= ?1
                 GROUP BY day ORDER BY day ASC",
            )?;
            let rows = stmt.query_map([cutoff], |row| {
                Ok(TimelinePoint {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })?;
            for row in rows {
                timeline.push(row.context("read timeline point")?);
            }
        }

        Ok(StoreStats {
            total,
            by_category,
            avg_score: avg_score.unwrap_or(0.0),
            histogram: ScoreHistogram { buckets },
            timeline,
        })
    }
}
