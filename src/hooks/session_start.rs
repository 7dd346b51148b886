//! SessionStart: re-inject the highest-value archived context into a fresh
//! or resumed session.

use super::{runtime, str_field, HookContext};
use crate::restore::restore_context;
use anyhow::Result;
use serde_json::Value;

/// Sources that warrant a restore. Anything else is a host event we stay out
/// of.
const RECOGNIZED_SOURCES: &[&str] = &["compact", "clear", "resume", "startup"];

/// Post-compaction restores run against an already-primed context window, so
/// the budget tightens.
const COMPACT_BUDGET_CAP: usize = 2000;

pub(super) fn run(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(session_id) = str_field(input, "session_id") else {
        return Ok(());
    };
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };
    let Some(source) = str_field(input, "source") else {
        return Ok(());
    };
    if !RECOGNIZED_SOURCES.contains(&source) {
        tracing::info!("[infinite-context] ignoring session start source {source:?}");
        return Ok(());
    }

    ctx.store.upsert_session(session_id, project)?;
    let config = ctx.project_config(project);
    let memories = ctx
        .store
        .top_memories(project, config.max_memories_per_restore)?;
    let budget = if source == "compact" {
        config.max_restore_tokens.min(COMPACT_BUDGET_CAP)
    } else {
        config.max_restore_tokens
    };

    let restored = restore_context(&memories, Some(budget), &config);
    if restored.is_empty() {
        return Ok(());
    }
    ctx.store.touch_memories(&restored.ids)?;
    runtime::emit_context("SessionStart", &restored.text);
    Ok(())
}
