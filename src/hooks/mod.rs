//! The six lifecycle hooks binding the memory engine to the host: archive on
//! compaction and shutdown, restore on session and subagent start, recall on
//! user prompts.
//!
//! Hooks never fail loudly. Bad input is a silent no-op; storage trouble is
//! logged to stderr; the process exits 0 on every path, because failing the
//! host is worse than degrading.

mod archive;
mod pre_compact;
mod rate_limit;
mod runtime;
mod session_end;
mod session_start;
mod subagent;
mod user_prompt;

use crate::config::{self, ContextConfig};
use crate::store::Store;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HookEvent {
    PreCompact,
    SessionStart,
    UserPromptSubmit,
    SubagentStart,
    SubagentStop,
    SessionEnd,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookEvent::PreCompact => "PreCompact",
            HookEvent::SessionStart => "SessionStart",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::SubagentStart => "SubagentStart",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::SessionEnd => "SessionEnd",
        };
        f.write_str(name)
    }
}

/// Everything a hook body needs. Built once per process; tests construct it
/// directly over temp directories.
pub struct HookContext {
    pub store: Store,
    pub config: Arc<ContextConfig>,
    pub data_root: PathBuf,
}

impl HookContext {
    pub fn initialize() -> Result<Self> {
        let data_root = crate::paths::data_root()?;
        let store = Store::open(&crate::paths::db_path()?).context("open memory store")?;
        Ok(Self {
            store,
            config: config::config(),
            data_root,
        })
    }

    fn project_config(&self, project: &str) -> ContextConfig {
        self.config.project_config(project)
    }
}

/// Run one hook end to end: read input, execute the body, flush stdout.
/// Every failure mode degrades to a stderr line; the caller always exits 0.
pub async fn run(event: HookEvent) {
    let Some(input) = runtime::read_hook_input().await else {
        tracing::info!("[infinite-context] {event}: no usable input, exiting quietly");
        return;
    };
    let ctx = match HookContext::initialize() {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!("[infinite-context] {event}: store unavailable: {err:#}");
            return;
        }
    };
    if let Err(err) = dispatch(event, &ctx, &input) {
        tracing::error!("[infinite-context] {event} hook failed: {err:#}");
    }
    runtime::flush_stdout();
}

/// Hook bodies, callable directly from tests with a prepared context.
pub fn dispatch(event: HookEvent, ctx: &HookContext, input: &Value) -> Result<()> {
    match event {
        HookEvent::PreCompact => pre_compact::run(ctx, input),
        HookEvent::SessionStart => session_start::run(ctx, input),
        HookEvent::UserPromptSubmit => user_prompt::run(ctx, input),
        HookEvent::SubagentStart => subagent::run_start(ctx, input),
        HookEvent::SubagentStop => subagent::run_stop(ctx, input),
        HookEvent::SessionEnd => session_end::run(ctx, input),
    }
}

/// Non-empty string field accessor shared by the hook bodies.
fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) fn test_context(config: ContextConfig) -> (tempfile::TempDir, HookContext) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = HookContext {
        store: Store::open(&dir.path().join("memories.db")).unwrap(),
        config: Arc::new(config),
        data_root: dir.path().to_path_buf(),
    };
    (dir, ctx)
}
