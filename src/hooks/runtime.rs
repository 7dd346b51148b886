//! The I/O contract every hook honors: read stdin once under a timeout,
//! write well-formed output to stdout, keep diagnostics on stderr, and never
//! fail loudly.

use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use tokio::io::AsyncReadExt;

/// How long to wait for the host to close stdin. Covers hosts that drop the
/// stream without an end event.
const STDIN_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(750);

#[derive(Serialize)]
struct HookOutput<'a> {
    #[serde(rename = "hookSpecificOutput")]
    hook_specific_output: HookSpecificOutput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput<'a> {
    hook_event_name: &'a str,
    additional_context: &'a str,
}

/// Read the whole of stdin, resolving exactly once whether the stream ends,
/// errors, or times out. Anything that does not parse as a JSON object is
/// treated as "no input".
pub(super) async fn read_hook_input() -> Option<Value> {
    let mut buffer = Vec::new();
    match tokio::time::timeout(STDIN_TIMEOUT, tokio::io::stdin().read_to_end(&mut buffer)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => {
            tracing::warn!("[infinite-context] stdin read failed: {err}");
            return None;
        }
        Err(_) => {
            tracing::warn!("[infinite-context] stdin read timed out");
        }
    }
    parse_input(&buffer)
}

fn parse_input(buffer: &[u8]) -> Option<Value> {
    serde_json::from_slice::<Value>(buffer)
        .ok()
        .filter(Value::is_object)
}

/// Write the context-bearing output document. Empty context suppresses the
/// write entirely, per the hook contract.
pub(super) fn emit_context(event_name: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let output = HookOutput {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: event_name,
            additional_context: text,
        },
    };
    match serde_json::to_string(&output) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!("[infinite-context] failed to encode hook output: {err}"),
    }
}

/// Plain-text output (PreCompact's compaction summary).
pub(super) fn emit_text(text: &str) {
    if text.is_empty() {
        return;
    }
    print!("{text}");
}

/// Drain stdout before the process exits.
pub(super) fn flush_stdout() {
    if let Err(err) = std::io::stdout().flush() {
        tracing::warn!("[infinite-context] stdout flush failed: {err}");
    }
}
