//! The shared archival pipeline: checkpointed transcript parse, rollback
//! recovery, extraction, deduplicated insert, checkpoint advance.

use super::HookContext;
use crate::extract::extractor_for;
use crate::transcript::{group_turns, parse_transcript};
use crate::types::NewMemory;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

pub(super) struct ArchiveOutcome {
    /// Rows actually inserted (hash duplicates count as zero).
    pub inserted: usize,
    /// Everything the extractor produced, for summary rendering.
    pub memories: Vec<NewMemory>,
    pub last_line: u64,
    pub rollback: bool,
}

/// Parse `transcript_path` from the saved checkpoint, extract memories, and
/// insert them. If the transcript is now shorter than the checkpoint the
/// host rewrote it (message editing or rollback); re-parse from line zero
/// and let source-hash dedup reject everything already archived.
pub(super) fn archive_transcript(
    ctx: &HookContext,
    session_key: &str,
    transcript_path: &str,
    project: &str,
    metadata_tag: Option<Value>,
) -> Result<ArchiveOutcome> {
    let config = ctx.project_config(project);
    let checkpoint = ctx
        .store
        .checkpoint(session_key, transcript_path)?
        .map_or(0, |c| c.last_line);

    let path = Path::new(transcript_path);
    let mut parsed = parse_transcript(path, checkpoint).context("parse transcript")?;
    let mut rollback = false;
    if parsed.messages.is_empty() && parsed.last_line < checkpoint {
        tracing::warn!(
            "[infinite-context] transcript shrank below checkpoint ({} < {checkpoint}), re-parsing from start",
            parsed.last_line
        );
        parsed = parse_transcript(path, 0).context("re-parse after rollback")?;
        rollback = true;
    }
    let last_line = parsed.last_line;

    let turns = group_turns(parsed.messages);
    let extractor = extractor_for(&config);
    let mut memories = extractor.extract(&turns, project, session_key);
    if let Some(tag) = metadata_tag {
        for memory in &mut memories {
            memory.metadata = Some(merge_metadata(&tag, memory.metadata.take()));
        }
    }

    let inserted = ctx.store.insert_many(&memories).context("insert memories")?;
    // The checkpoint advances even when extraction produced nothing, so the
    // same lines are never reprocessed.
    ctx.store
        .save_checkpoint(session_key, transcript_path, last_line)
        .context("save checkpoint")?;

    Ok(ArchiveOutcome {
        inserted,
        memories,
        last_line,
        rollback,
    })
}

/// Overlay existing metadata onto the tag; existing keys win.
fn merge_metadata(tag: &Value, existing: Option<Value>) -> Value {
    let mut merged = tag.clone();
    if let (Some(target), Some(Value::Object(source))) = (merged.as_object_mut(), existing) {
        for (key, value) in source {
            target.insert(key, value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::hooks::test_context;
    use std::io::Write;

    fn write_lines(path: &Path, lines: &[String]) {
        let mut file = std::fs::File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    fn user_line(text: &str) -> String {
        format!(r#"{{"type":"user","message":{{"role":"user","content":"{text}"}}}}"#)
    }

    #[test]
    fn archive_extracts_inserts_and_checkpoints() {
        let (dir, ctx) = test_context(ContextConfig::default());
        let transcript = dir.path().join("t.jsonl");
        write_lines(
            &transcript,
            &[user_line("please wire the retry logic into the client")],
        );
        let path = transcript.to_string_lossy().to_string();

        let outcome = archive_transcript(&ctx, "sess", &path, "/proj", None).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.last_line, 1);
        assert!(!outcome.rollback);
        assert_eq!(
            ctx.store.checkpoint("sess", &path).unwrap().unwrap().last_line,
            1
        );

        // Nothing new: no inserts, checkpoint stays.
        let again = archive_transcript(&ctx, "sess", &path, "/proj", None).unwrap();
        assert_eq!(again.inserted, 0);
        assert!(again.memories.is_empty());
    }

    #[test]
    fn shrunken_transcript_triggers_rollback_reparse_without_duplicates() {
        let (dir, ctx) = test_context(ContextConfig::default());
        let transcript = dir.path().join("t.jsonl");
        let lines: Vec<String> = (0..10)
            .map(|i| user_line(&format!("request number {i} with enough length to note")))
            .collect();
        write_lines(&transcript, &lines);
        let path = transcript.to_string_lossy().to_string();

        let first = archive_transcript(&ctx, "sess", &path, "/proj", None).unwrap();
        assert_eq!(first.inserted, 10);

        // Host rewrote the transcript down to the first 4 messages.
        write_lines(&transcript, &lines[..4].to_vec());
        let second = archive_transcript(&ctx, "sess", &path, "/proj", None).unwrap();
        assert!(second.rollback);
        assert_eq!(second.last_line, 4);
        // All four were already archived; dedup rejects them.
        assert_eq!(second.inserted, 0);
        assert_eq!(
            ctx.store.checkpoint("sess", &path).unwrap().unwrap().last_line,
            4
        );
        assert_eq!(ctx.store.stats().unwrap().total, 10);
    }

    #[test]
    fn metadata_tag_is_applied_structurally() {
        let (dir, ctx) = test_context(ContextConfig::default());
        let transcript = dir.path().join("t.jsonl");
        write_lines(
            &transcript,
            &[user_line("tag this request with the agent identity")],
        );
        let path = transcript.to_string_lossy().to_string();
        let tag = serde_json::json!({"agentId": "ag-1", "agentType": "explorer"});

        archive_transcript(&ctx, "sess:ag-1", &path, "/proj", Some(tag)).unwrap();

        let page = ctx
            .store
            .list_memories(&crate::store::ListParams::default())
            .unwrap();
        let metadata = page.memories[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["agentId"], "ag-1");
        assert_eq!(metadata["agentType"], "explorer");
    }

    #[test]
    fn merge_keeps_existing_keys_over_tag() {
        let tag = serde_json::json!({"agentId": "ag-1", "shared": "tag"});
        let existing = serde_json::json!({"shared": "existing"});
        let merged = merge_metadata(&tag, Some(existing));
        assert_eq!(merged["agentId"], "ag-1");
        assert_eq!(merged["shared"], "existing");
    }
}
