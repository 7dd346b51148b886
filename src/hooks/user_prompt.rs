//! UserPromptSubmit: recall memories relevant to the prompt, rate-limited to
//! one search per session per minute.

use super::rate_limit::PromptRateLimiter;
use super::{runtime, str_field, HookContext};
use crate::restore::recall_for_prompt;
use crate::scoring::{estimate_tokens, extract_keywords};
use anyhow::Result;
use serde_json::Value;

/// Prompts shorter than this carry no searchable signal.
const MIN_PROMPT_CHARS: usize = 10;

/// Recall blocks beyond this estimated size truncate by line.
const RECALL_TOKEN_CEILING: usize = 600;
const RECALL_TOKEN_TARGET: usize = 500;

pub(super) fn run(ctx: &HookContext, input: &Value) -> Result<()> {
    let Some(project) = str_field(input, "cwd") else {
        return Ok(());
    };
    let Some(prompt) = str_field(input, "prompt") else {
        return Ok(());
    };
    let prompt = prompt.trim();
    if prompt.chars().count() < MIN_PROMPT_CHARS
        || prompt.starts_with('/')
        || prompt.starts_with('<')
    {
        return Ok(());
    }

    // The host does not always send a session id here; fall back to the
    // project as the limiter key.
    let limiter_key = str_field(input, "session_id").unwrap_or(project);
    let limiter = PromptRateLimiter::new(&ctx.data_root.join("prompt-state.json"));
    if !limiter.allow(limiter_key, chrono::Utc::now().timestamp()) {
        return Ok(());
    }

    let config = ctx.project_config(project);
    let keywords = extract_keywords(&config, prompt);
    if keywords.is_empty() {
        return Ok(());
    }

    let hits = ctx
        .store
        .search(&keywords, Some(project), config.max_prompt_recall_results)?;
    let recalled = recall_for_prompt(&hits);
    if recalled.is_empty() {
        return Ok(());
    }

    let text = if estimate_tokens(&recalled.text) > RECALL_TOKEN_CEILING {
        truncate_by_lines(&recalled.text, RECALL_TOKEN_TARGET)
    } else {
        recalled.text.clone()
    };

    ctx.store.touch_memories(&recalled.ids)?;
    runtime::emit_context("UserPromptSubmit", &text);
    Ok(())
}

/// Keep whole lines while the running estimate stays inside the target.
fn truncate_by_lines(text: &str, target_tokens: usize) -> String {
    let mut kept = String::new();
    for line in text.lines() {
        let candidate_tokens = estimate_tokens(&kept) + estimate_tokens(line) + 1;
        if candidate_tokens > target_tokens {
            break;
        }
        kept.push_str(line);
        kept.push('\n');
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use crate::hooks::test_context;
    use crate::store::ListParams;
    use crate::types::{MemoryCategory, NewMemory};
    use serde_json::json;

    fn seed(ctx: &HookContext, content: &str, keywords: &str) {
        ctx.store
            .insert_memory(&NewMemory {
                project: "/proj".into(),
                session_id: "sess".into(),
                category: MemoryCategory::Finding,
                content: content.into(),
                keywords: keywords.into(),
                score: Some(0.6),
                source_hash: None,
                metadata: None,
            })
            .unwrap();
    }

    fn access_counts(ctx: &HookContext) -> Vec<i64> {
        ctx.store
            .list_memories(&ListParams::default())
            .unwrap()
            .memories
            .iter()
            .map(|m| m.access_count)
            .collect()
    }

    #[test]
    fn matching_prompt_touches_recalled_memories() {
        let (_dir, ctx) = test_context(ContextConfig::default());
        seed(&ctx, "The websocket reconnect bug lives in client.rs", "websocket reconnect bug");

        let input = json!({"cwd": "/proj", "prompt": "how did we fix the websocket reconnect issue?"});
        run(&ctx, &input).unwrap();
        assert_eq!(access_counts(&ctx), vec![1]);
    }

    #[test]
    fn short_and_system_shaped_prompts_are_ignored() {
        let (_dir, ctx) = test_context(ContextConfig::default());
        seed(&ctx, "websocket notes", "websocket");

        for prompt in ["hi", "/compact now please", "<system-note>websocket</system-note>"] {
            let input = json!({"cwd": "/proj", "prompt": prompt});
            run(&ctx, &input).unwrap();
        }
        assert_eq!(access_counts(&ctx), vec![0]);
    }

    #[test]
    fn second_recall_within_a_minute_is_rate_limited() {
        let (_dir, ctx) = test_context(ContextConfig::default());
        seed(&ctx, "websocket reconnect handling", "websocket reconnect");

        let input =
            json!({"cwd": "/proj", "session_id": "s1", "prompt": "websocket reconnect details please"});
        run(&ctx, &input).unwrap();
        run(&ctx, &input).unwrap();
        assert_eq!(access_counts(&ctx), vec![1]);
    }

    #[test]
    fn truncation_keeps_whole_lines_under_target() {
        let text: String = (0..200)
            .map(|i| format!("- [note] line number {i} with a bit of padding text\n"))
            .collect();
        let truncated = truncate_by_lines(&text, 500);
        assert!(estimate_tokens(&truncated) <= 500);
        assert!(truncated.ends_with('\n'));
        assert!(truncated.lines().count() > 10);
    }
}
