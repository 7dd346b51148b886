use super::{source_hash, Extractor};
use crate::config::ContextConfig;
use crate::scoring::{extract_keywords, score_memory};
use crate::transcript::Turn;
use crate::types::{MemoryCategory, NewMemory};
use crate::util::{truncate_bytes, truncate_with_ellipsis};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Tool names whose invocations count as file changes.
const FILE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];

/// Package-manager / deploy / infra command shapes worth remembering.
static NOTABLE_COMMANDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bnpm\s+(install|uninstall|init|run|test)\b",
        r"\bpip3?\s+(install|uninstall)\b",
        r"\bgit\s+(init|clone|checkout|merge|rebase|tag)\b",
        r"\bdocker\s+(build|run|compose|push|pull)\b",
        r"\bcargo\s+[a-z-]+",
        r"\bmake\b",
        r"\b(psql|mysql|sqlite3|mongosh|redis-cli)\b",
        r"curl\s+-X\s+(POST|PUT|DELETE|PATCH)\b",
        r"\bmkdir\s+-p\b",
        r"\b(chmod|chown)\b",
        r"\b(systemctl|service)\s",
        r"\bssh\s",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("notable-command pattern"))
    .collect()
});

/// Decision phrasing. Matching is lowercase substring over one line of
/// assistant text.
const DECISION_PHRASES: &[&str] = &[
    "i'll",
    "i will",
    "let's",
    "let me",
    "we should",
    "we'll",
    "the approach",
    "instead of",
    "rather than",
    "decided to",
    "choosing",
    "going with",
    "opted for",
];

/// Pure-intent lines that read like decisions but carry none.
const SUPPRESSED_INTENTS: &[&str] = &[
    "i'll read",
    "i'll check",
    "let me read",
    "let me look",
    "let me search",
    "let me check",
];

/// Architecture vocabulary matched against assistant thinking lines.
const ARCHITECTURE_TERMS: &[&str] = &[
    "architecture",
    "design pattern",
    "module",
    "component",
    "interface",
    "abstraction",
    "separation of concerns",
    "dependency",
    "coupling",
    "cohesion",
    "trade-off",
    "tradeoff",
    "approach",
    "strategy",
    "layer",
];

const MAX_DECISIONS_PER_MESSAGE: usize = 3;
const MAX_ARCHITECTURE_PER_THINKING: usize = 2;

pub struct RuleExtractor {
    config: ContextConfig,
}

impl RuleExtractor {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build a record with the shared defaults: 500-byte content cap,
    /// keywords derived from the content, hash over the deriving text.
    fn memory(
        &self,
        project: &str,
        session_id: &str,
        category: MemoryCategory,
        content: &str,
        hash_text: &str,
        score_override: Option<f64>,
    ) -> NewMemory {
        let content = truncate_bytes(content, 500).to_string();
        let keywords = extract_keywords(&self.config, &content);
        let score = score_override
            .unwrap_or_else(|| score_memory(&self.config, category.as_str(), &content));
        NewMemory {
            project: project.to_string(),
            session_id: session_id.to_string(),
            category,
            content,
            keywords,
            score: Some(score),
            source_hash: Some(source_hash(hash_text)),
            metadata: None,
        }
    }

    fn extract_file_changes(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        for call in &turn.tool_calls {
            if !FILE_TOOLS.contains(&call.name.as_str()) {
                continue;
            }
            let Some(path) = file_path_of(&call.input) else {
                continue;
            };
            if call.name == "Write" {
                let content = format!("Created/wrote file: {path}");
                out.push(self.memory(
                    project,
                    session_id,
                    MemoryCategory::FileChange,
                    &content,
                    &content,
                    None,
                ));
            } else {
                // The hash covers only the prefix + path so repeated edits to
                // one file dedup to a single memory.
                let hash_text = format!("Edited file: {path}");
                let content = match edit_snippet(&call.input) {
                    Some(snippet) => format!("{hash_text}\n  Changed: {snippet}"),
                    None => hash_text.clone(),
                };
                out.push(self.memory(
                    project,
                    session_id,
                    MemoryCategory::FileChange,
                    &content,
                    &hash_text,
                    None,
                ));
            }
        }
    }

    fn extract_commands(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        for call in &turn.tool_calls {
            if call.name != "Bash" {
                continue;
            }
            let Some(command) = call.input.get("command").and_then(Value::as_str) else {
                continue;
            };
            let command = command.trim();
            if command.is_empty() || !is_notable_command(command) {
                continue;
            }
            let content = format!("Ran command: {}", truncate_with_ellipsis(command, 200));
            out.push(self.memory(
                project,
                session_id,
                MemoryCategory::Note,
                &content,
                &content,
                None,
            ));
        }
    }

    fn extract_errors(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        for result in &turn.tool_results {
            if !result.is_error {
                continue;
            }
            let detail = result.content.trim();
            if detail.is_empty() {
                continue;
            }
            let content = format!("Error encountered: {}", truncate_with_ellipsis(detail, 300));
            out.push(self.memory(
                project,
                session_id,
                MemoryCategory::Error,
                &content,
                &content,
                None,
            ));
        }
    }

    fn extract_decisions(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        for message in &turn.assistant_messages {
            let mut found = 0;
            for line in message.text.lines() {
                let line = line.trim();
                let length = line.chars().count();
                if !(20..=300).contains(&length) {
                    continue;
                }
                let lower = line.to_lowercase();
                if !DECISION_PHRASES.iter().any(|p| lower.contains(p)) {
                    continue;
                }
                if SUPPRESSED_INTENTS.iter().any(|p| lower.contains(p)) {
                    continue;
                }
                out.push(self.memory(
                    project,
                    session_id,
                    MemoryCategory::Decision,
                    line,
                    line,
                    None,
                ));
                found += 1;
                if found == MAX_DECISIONS_PER_MESSAGE {
                    break;
                }
            }
        }
    }

    fn extract_architecture(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        for message in &turn.assistant_messages {
            if message.thinking.is_empty() {
                continue;
            }
            let mut found = 0;
            for line in message.thinking.lines() {
                let line = line.trim();
                let length = line.chars().count();
                if !(30..=400).contains(&length) {
                    continue;
                }
                let lower = line.to_lowercase();
                if !ARCHITECTURE_TERMS.iter().any(|t| lower.contains(t)) {
                    continue;
                }
                out.push(self.memory(
                    project,
                    session_id,
                    MemoryCategory::Architecture,
                    line,
                    line,
                    None,
                ));
                found += 1;
                if found == MAX_ARCHITECTURE_PER_THINKING {
                    break;
                }
            }
        }
    }

    fn extract_user_request(
        &self,
        turn: &Turn,
        project: &str,
        session_id: &str,
        out: &mut Vec<NewMemory>,
    ) {
        let text = turn.user_message.text.trim();
        let length = text.chars().count();
        // Strict lower bound, inclusive upper: 21..=500 characters.
        if length <= 20 || length > 500 {
            return;
        }
        let content = format!("User request: {text}");
        out.push(self.memory(
            project,
            session_id,
            MemoryCategory::Note,
            &content,
            &content,
            Some(0.35),
        ));
    }
}

impl Extractor for RuleExtractor {
    fn extract(&self, turns: &[Turn], project: &str, session_id: &str) -> Vec<NewMemory> {
        let mut out = Vec::new();
        for turn in turns {
            self.extract_file_changes(turn, project, session_id, &mut out);
            self.extract_commands(turn, project, session_id, &mut out);
            self.extract_errors(turn, project, session_id, &mut out);
            self.extract_decisions(turn, project, session_id, &mut out);
            self.extract_architecture(turn, project, session_id, &mut out);
            self.extract_user_request(turn, project, session_id, &mut out);
        }
        out
    }
}

fn is_notable_command(command: &str) -> bool {
    NOTABLE_COMMANDS.iter().any(|re| re.is_match(command))
}

fn file_path_of(input: &Value) -> Option<&str> {
    input
        .get("file_path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .or_else(|| {
            input
                .get("path")
                .and_then(Value::as_str)
                .filter(|p| !p.is_empty())
        })
}

/// One-line `"OLD…" → "NEW…"` rendering for Edit calls that carry an
/// old_string. Multi-line strings collapse to spaces before truncation.
fn edit_snippet(input: &Value) -> Option<String> {
    let old = input
        .get("old_string")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?;
    let new = input.get("new_string").and_then(Value::as_str).unwrap_or("");
    Some(format!(
        "\"{}\" → \"{}\"",
        truncate_with_ellipsis(&collapse_whitespace(old), 40),
        truncate_with_ellipsis(&collapse_whitespace(new), 40),
    ))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
