use super::{ParsedTranscript, Role, ToolCall, ToolResult, TranscriptMessage};
use crate::error::TranscriptError;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read a JSONL transcript from `path`, skipping the first `start_line`
/// non-blank lines (already processed on a previous run).
///
/// Blank lines never advance the cursor; malformed JSON lines advance it but
/// are otherwise skipped silently, so a corrupt line is never reprocessed.
pub fn parse_transcript(
    path: &Path,
    start_line: u64,
) -> Result<ParsedTranscript, TranscriptError> {
    let file = File::open(path).map_err(|source| TranscriptError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut line_no = 0u64;
    let mut messages = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|source| TranscriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        line_no += 1;
        if line_no <= start_line {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if let Some(message) = parse_entry(&value, line_no) {
            messages.push(message);
        }
    }

    Ok(ParsedTranscript {
        messages,
        last_line: line_no,
    })
}

fn parse_entry(value: &Value, line: u64) -> Option<TranscriptMessage> {
    let obj = value.as_object()?;
    let role = derive_role(obj)?;
    let body = obj
        .get("message")
        .and_then(Value::as_object)
        .unwrap_or(obj);

    let mut message = TranscriptMessage::new(role, line);
    match body.get("content") {
        Some(Value::String(text)) => message.text.push_str(text),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                walk_block(block, &mut message);
            }
        }
        _ => {}
    }
    Some(message)
}

/// `message.role` wins; the top-level `type` is the fallback. The legacy
/// `"A"` envelope aliases to assistant. Everything else (system, progress,
/// file-history-snapshot, …) is discarded.
fn derive_role(obj: &Map<String, Value>) -> Option<Role> {
    if let Some(role) = obj
        .get("message")
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str)
    {
        match role {
            "user" => return Some(Role::User),
            "assistant" => return Some(Role::Assistant),
            _ => {}
        }
    }
    match obj.get("type").and_then(Value::as_str) {
        Some("user") => Some(Role::User),
        Some("assistant") => Some(Role::Assistant),
        Some("A") => {
            tracing::debug!("legacy 'A' message envelope treated as assistant");
            Some(Role::Assistant)
        }
        _ => None,
    }
}

fn walk_block(block: &Value, message: &mut TranscriptMessage) {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                if !message.text.is_empty() {
                    message.text.push('\n');
                }
                message.text.push_str(text);
            }
        }
        Some("thinking") => {
            if let Some(thinking) = block.get("thinking").and_then(Value::as_str) {
                if !message.thinking.is_empty() {
                    message.thinking.push('\n');
                }
                message.thinking.push_str(thinking);
            }
        }
        Some("tool_use") => {
            message.tool_calls.push(ToolCall {
                name: string_field(block, "name"),
                id: string_field(block, "id"),
                input: block.get("input").cloned().unwrap_or(Value::Null),
            });
        }
        Some("tool_result") => {
            message.tool_results.push(ToolResult {
                tool_use_id: string_field(block, "tool_use_id"),
                content: flatten_result_content(block.get("content")),
                is_error: block
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            });
        }
        _ => {}
    }
}

fn string_field(block: &Value, key: &str) -> String {
    block
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Tool-result content is a string, or an array of text blocks joined with
/// newlines; anything else flattens to empty.
fn flatten_result_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
