//! Incremental transcript ingestion: JSONL parsing with non-blank line
//! checkpoints, and grouping of messages into conversational turns.

mod parser;
mod turns;

pub use parser::parse_transcript;
pub use turns::group_turns;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub id: String,
    pub input: Value,
}

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

/// One transcript entry that survived role derivation.
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    pub role: Role,
    pub text: String,
    pub thinking: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub line: u64,
}

impl TranscriptMessage {
    pub(crate) fn new(role: Role, line: u64) -> Self {
        Self {
            role,
            text: String::new(),
            thinking: String::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            line,
        }
    }
}

/// Parser output: surviving messages plus the greatest non-blank line number
/// the cursor reached (the next checkpoint).
#[derive(Debug, Default)]
pub struct ParsedTranscript {
    pub messages: Vec<TranscriptMessage>,
    pub last_line: u64,
}

/// A user message plus the assistant replies it elicited, with all tool
/// calls and results that occurred inside.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_message: TranscriptMessage,
    pub assistant_messages: Vec<TranscriptMessage>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub start_line: u64,
    pub end_line: u64,
}

impl Turn {
    fn open(user_message: TranscriptMessage) -> Self {
        let start_line = user_message.line;
        let tool_calls = user_message.tool_calls.clone();
        let tool_results = user_message.tool_results.clone();
        Self {
            user_message,
            assistant_messages: Vec::new(),
            tool_calls,
            tool_results,
            start_line,
            end_line: start_line,
        }
    }
}
