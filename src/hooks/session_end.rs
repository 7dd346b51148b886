//! SessionEnd: final incremental archive, decay and prune, cap enforcement,
//! session close. Emits nothing.

use super::archive::archive_transcript;
use super::{str_field, HookContext};
use anyhow::Result;
use serde_json::Value;

pub(super) fn run(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(session_id) = str_field(input, "session_id") else {
        return Ok(());
    };
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };

    if let Some(transcript_path) = str_field(input, "transcript_path") {
        match archive_transcript(ctx, session_id, transcript_path, project, None) {
            Ok(outcome) => {
                ctx.store.incr_session_memories(session_id, outcome.inserted)?;
            }
            // A vanished transcript is not worth failing cleanup over.
            Err(err) => tracing::warn!("[infinite-context] final archive skipped: {err:#}"),
        }
    }

    let config = ctx.project_config(project);
    let pruned = ctx.store.decay_and_prune(&config)?;
    if pruned > 0 {
        tracing::info!("[infinite-context] pruned {pruned} decayed memories");
    }
    ctx.store
        .enforce_project_limit(project, config.max_memories_per_project)?;
    ctx.store.end_session(session_id)?;
    Ok(())
}
