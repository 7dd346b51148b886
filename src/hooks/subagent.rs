//! Subagent hooks: seed a spawned agent with a reduced slice of project
//! context, and archive its private transcript when it stops.

use super::archive::archive_transcript;
use super::{runtime, str_field, HookContext};
use crate::restore::restore_context;
use anyhow::Result;
use serde_json::{json, Value};

/// Subagents get 60% of the session budget and memory count.
const SUBAGENT_SHARE: f64 = 0.6;

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn scaled(value: usize) -> usize {
    (value as f64 * SUBAGENT_SHARE).floor() as usize
}

pub(super) fn run_start(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };
    if let Some(agent_type) = str_field(input, "agent_type") {
        tracing::info!("[infinite-context] seeding {agent_type} subagent");
    }

    let config = ctx.project_config(project);
    let memories = ctx
        .store
        .top_memories(project, scaled(config.max_memories_per_restore))?;
    let budget = scaled(config.max_restore_tokens);

    let restored = restore_context(&memories, Some(budget), &config);
    if restored.is_empty() {
        return Ok(());
    }
    ctx.store.touch_memories(&restored.ids)?;
    runtime::emit_context("SubagentStart", &restored.text);
    Ok(())
}

pub(super) fn run_stop(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(session_id) = str_field(input, "session_id") else {
        return Ok(());
    };
    let Some(agent_id) = str_field(input, "agent_id") else {
        return Ok(());
    };
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };
    let Some(transcript_path) = str_field(input, "agent_transcript_path") else {
        return Ok(());
    };

    // The agent's checkpoint line is independent of the parent session's.
    let session_key = format!("{session_id}:{agent_id}");
    let tag = json!({
        "agentId": agent_id,
        "agentType": str_field(input, "agent_type").unwrap_or(""),
    });

    ctx.store.upsert_session(session_id, project)?;
    let outcome = archive_transcript(ctx, &session_key, transcript_path, project, Some(tag))?;
    ctx.store.incr_session_memories(session_id, outcome.inserted)?;
    let config = ctx.project_config(project);
    ctx.store
        .enforce_project_limit(project, config.max_memories_per_project)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::hooks::test_context;
    use crate::store::ListParams;
    use crate::types::{MemoryCategory, NewMemory};
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn scaled_floors_the_share() {
        assert_eq!(scaled(4000), 2400);
        assert_eq!(scaled(20), 12);
        assert_eq!(scaled(1), 0);
    }

    #[test]
    fn subagent_start_touches_restored_memories() {
        let (_dir, ctx) = test_context(ContextConfig::default());
        ctx.store
            .insert_memory(&NewMemory {
                project: "/proj".into(),
                session_id: "sess".into(),
                category: MemoryCategory::Architecture,
                content: "The gateway owns all outbound connections".into(),
                keywords: String::new(),
                score: Some(0.7),
                source_hash: None,
                metadata: None,
            })
            .unwrap();

        let input = json!({"cwd": "/proj", "agent_id": "ag-1", "agent_type": "explorer"});
        run_start(&ctx, &input).unwrap();

        let page = ctx.store.list_memories(&ListParams::default()).unwrap();
        assert_eq!(page.memories[0].access_count, 1);
    }

    #[test]
    fn subagent_stop_archives_with_agent_scoped_checkpoint() {
        let (dir, ctx) = test_context(ContextConfig::default());
        let transcript = dir.path().join("agent.jsonl");
        let mut file = std::fs::File::create(&transcript).unwrap();
        writeln!(
            file,
            r#"{{"type":"user","message":{{"role":"user","content":"summarize the storage layer design notes"}}}}"#
        )
        .unwrap();
        drop(file);
        let path = transcript.to_string_lossy().to_string();

        let input = json!({
            "session_id": "parent",
            "agent_id": "ag-7",
            "agent_type": "researcher",
            "cwd": "/proj",
            "agent_transcript_path": path,
        });
        run_stop(&ctx, &input).unwrap();

        let checkpoint = ctx.store.checkpoint("parent:ag-7", &path).unwrap().unwrap();
        assert_eq!(checkpoint.last_line, 1);

        let page = ctx.store.list_memories(&ListParams::default()).unwrap();
        let metadata = page.memories[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["agentId"], "ag-7");
        assert_eq!(metadata["agentType"], "researcher");

        let sessions = ctx.store.all_sessions().unwrap();
        assert_eq!(sessions[0].memories_created, 1);
    }
}
