//! PreCompact: archive the transcript before the host collapses it, then
//! hand back a plain-text summary of what was preserved.

use super::archive::archive_transcript;
use super::{runtime, str_field, HookContext};
use crate::types::{MemoryCategory, NewMemory};
use crate::util::truncate_bytes;
use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// File paths are pulled from the category content by capture group, never
/// by splitting on colons (paths may contain them).
static FILE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:Created/wrote|Edited) file: (.+)$").expect("file-path pattern")
});

const SUMMARY_BYTE_LIMIT: usize = 2000;

pub(super) fn run(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(session_id) = str_field(input, "session_id") else {
        return Ok(());
    };
    let Some(transcript_path) = str_field(input, "transcript_path") else {
        return Ok(());
    };
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };
    if let Some(trigger) = str_field(input, "trigger") {
        tracing::info!("[infinite-context] compaction triggered by {trigger}");
    }

    ctx.store.upsert_session(session_id, project)?;
    let outcome = archive_transcript(ctx, session_id, transcript_path, project, None)?;
    ctx.store.incr_session_memories(session_id, outcome.inserted)?;
    ctx.store.incr_session_compactions(session_id)?;
    let config = ctx.project_config(project);
    ctx.store
        .enforce_project_limit(project, config.max_memories_per_project)?;

    let summary = compaction_summary(project, outcome.inserted, &outcome.memories);
    runtime::emit_text(truncate_bytes(&summary, SUMMARY_BYTE_LIMIT));
    Ok(())
}

fn compaction_summary(project: &str, inserted: usize, memories: &[NewMemory]) -> String {
    let mut summary = format!(
        "CONTEXT ARCHIVE (from infinite-context):\nProject: {project}\nArchived {inserted} memories from this compaction.\n"
    );

    let decisions: Vec<&str> = memories
        .iter()
        .filter(|m| m.category == MemoryCategory::Decision)
        .map(|m| m.content.as_str())
        .take(3)
        .collect();
    if !decisions.is_empty() {
        summary.push_str("\nKey decisions:\n");
        for decision in decisions {
            summary.push_str(&format!("- {decision}\n"));
        }
    }

    let mut files: Vec<&str> = Vec::new();
    for memory in memories
        .iter()
        .filter(|m| m.category == MemoryCategory::FileChange)
    {
        if let Some(captures) = FILE_PATH_RE.captures(&memory.content) {
            if let Some(path) = captures.get(1) {
                let path = path.as_str();
                if !files.contains(&path) {
                    files.push(path);
                }
            }
        }
    }
    if !files.is_empty() {
        summary.push_str("\nFiles changed:\n");
        for file in files.iter().take(10) {
            summary.push_str(&format!("- {file}\n"));
        }
    }

    let errors: Vec<&str> = memories
        .iter()
        .filter(|m| m.category == MemoryCategory::Error)
        .map(|m| m.content.as_str())
        .take(3)
        .collect();
    if !errors.is_empty() {
        summary.push_str("\nErrors seen:\n");
        for error in errors {
            summary.push_str(&format!("- {error}\n"));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_memory(category: MemoryCategory, content: &str) -> NewMemory {
        NewMemory {
            project: "/proj".into(),
            session_id: "sess".into(),
            category,
            content: content.into(),
            keywords: String::new(),
            score: Some(0.5),
            source_hash: None,
            metadata: None,
        }
    }

    #[test]
    fn summary_leads_with_the_archive_banner() {
        let summary = compaction_summary("/proj", 0, &[]);
        assert!(summary.starts_with("CONTEXT ARCHIVE (from infinite-context):"));
        assert!(summary.contains("Project: /proj"));
        assert!(!summary.contains("Key decisions"));
    }

    #[test]
    fn summary_extracts_file_paths_by_capture_group() {
        let memories = vec![
            new_memory(MemoryCategory::FileChange, "Created/wrote file: C:/odd: path/app.rs"),
            new_memory(
                MemoryCategory::FileChange,
                "Edited file: src/lib.rs\n  Changed: \"a\" → \"b\"",
            ),
            new_memory(MemoryCategory::FileChange, "Edited file: src/lib.rs"),
        ];
        let summary = compaction_summary("/proj", 3, &memories);
        // Colons inside the path survive intact, and paths dedupe.
        assert!(summary.contains("- C:/odd: path/app.rs\n"));
        assert_eq!(summary.matches("- src/lib.rs\n").count(), 1);
    }

    #[test]
    fn summary_caps_decisions_and_errors_at_three() {
        let mut memories = Vec::new();
        for i in 0..5 {
            memories.push(new_memory(
                MemoryCategory::Decision,
                &format!("decision {i}"),
            ));
            memories.push(new_memory(
                MemoryCategory::Error,
                &format!("Error encountered: boom {i}"),
            ));
        }
        let summary = compaction_summary("/proj", 10, &memories);
        assert_eq!(summary.matches("- decision").count(), 3);
        assert_eq!(summary.matches("- Error encountered").count(), 3);
    }
}
