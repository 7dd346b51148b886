use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed category set. Unknown strings read back from older or foreign
/// rows survive as raw text on [`Memory`] and bucket into `Note` on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Architecture,
    Decision,
    Error,
    Finding,
    FileChange,
    Note,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 6] = [
        MemoryCategory::Architecture,
        MemoryCategory::Decision,
        MemoryCategory::Error,
        MemoryCategory::Finding,
        MemoryCategory::FileChange,
        MemoryCategory::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryCategory::Architecture => "architecture",
            MemoryCategory::Decision => "decision",
            MemoryCategory::Error => "error",
            MemoryCategory::Finding => "finding",
            MemoryCategory::FileChange => "file_change",
            MemoryCategory::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "architecture" => Some(MemoryCategory::Architecture),
            "decision" => Some(MemoryCategory::Decision),
            "error" => Some(MemoryCategory::Error),
            "finding" => Some(MemoryCategory::Finding),
            "file_change" => Some(MemoryCategory::FileChange),
            "note" => Some(MemoryCategory::Note),
            _ => None,
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored memory row.
#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    pub id: i64,
    pub project: String,
    pub session_id: Option<String>,
    pub category: String,
    pub content: String,
    pub keywords: String,
    pub score: f64,
    pub created_at: String,
    pub last_accessed: String,
    pub access_count: i64,
    pub source_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A memory record about to be inserted. `score: None` means "no explicit
/// base score" and resolves to 0.5 at the storage boundary; an explicit 0.0
/// is preserved. `metadata` is a structured value, serialized exactly once
/// by the store.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub project: String,
    pub session_id: String,
    pub category: MemoryCategory,
    pub content: String,
    pub keywords: String,
    pub score: Option<f64>,
    pub source_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Parser resumption cursor for one `(session, transcript_path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: i64,
    pub session_id: String,
    pub transcript_path: String,
    pub last_line: u64,
    pub created_at: String,
}

/// One host conversation as tracked by the store.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRow {
    pub session_id: String,
    pub project: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub memories_created: i64,
    pub compactions: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in MemoryCategory::ALL {
            assert_eq!(MemoryCategory::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn unknown_category_does_not_parse() {
        assert_eq!(MemoryCategory::parse("mystery"), None);
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&MemoryCategory::FileChange).unwrap();
        assert_eq!(json, "\"file_change\"");
    }
}
