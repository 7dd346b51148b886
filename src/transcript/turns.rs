use super::{Role, TranscriptMessage, Turn};

/// Group messages into turns.
///
/// The transcript represents each tool result as a separate user entry. A
/// user message with empty text but tool results folds into the open turn
/// instead of starting a new one; without that rule every tool invocation
/// would spawn an empty turn and orphan its results.
///
/// Assistant messages that appear before any user message are discarded.
pub fn group_turns(messages: Vec<TranscriptMessage>) -> Vec<Turn> {
    let mut turns = Vec::new();
    let mut current: Option<Turn> = None;

    for message in messages {
        match message.role {
            Role::User => {
                let synthetic = message.text.trim().is_empty() && !message.tool_results.is_empty();
                if synthetic {
                    if let Some(turn) = current.as_mut() {
                        turn.end_line = message.line;
                        turn.tool_results.extend(message.tool_results);
                        continue;
                    }
                }
                if let Some(turn) = current.take() {
                    turns.push(turn);
                }
                current = Some(Turn::open(message));
            }
            Role::Assistant => {
                let Some(turn) = current.as_mut() else {
                    continue;
                };
                turn.end_line = message.line;
                turn.tool_calls.extend(message.tool_calls.iter().cloned());
                turn.tool_results.extend(message.tool_results.iter().cloned());
                turn.assistant_messages.push(message);
            }
        }
    }

    if let Some(turn) = current.take() {
        turns.push(turn);
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{ToolCall, ToolResult};

    fn user(text: &str, line: u64) -> TranscriptMessage {
        let mut message = TranscriptMessage::new(Role::User, line);
        message.text = text.to_string();
        message
    }

    fn assistant(text: &str, line: u64) -> TranscriptMessage {
        let mut message = TranscriptMessage::new(Role::Assistant, line);
        message.text = text.to_string();
        message
    }

    fn synthetic_result(content: &str, line: u64) -> TranscriptMessage {
        let mut message = TranscriptMessage::new(Role::User, line);
        message.tool_results.push(ToolResult {
            tool_use_id: "t1".into(),
            content: content.into(),
            is_error: false,
        });
        message
    }

    #[test]
    fn user_then_assistant_forms_one_turn() {
        let turns = group_turns(vec![user("question", 1), assistant("answer", 2)]);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_message.text, "question");
        assert_eq!(turns[0].assistant_messages.len(), 1);
        assert_eq!(turns[0].start_line, 1);
        assert_eq!(turns[0].end_line, 2);
    }

    #[test]
    fn synthetic_tool_result_folds_into_open_turn() {
        let turns = group_turns(vec![
            user("run it", 1),
            assistant("running", 2),
            synthetic_result("ok", 3),
            assistant("done", 4),
        ]);

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].tool_results.len(), 1);
        assert_eq!(turns[0].assistant_messages.len(), 2);
        assert_eq!(turns[0].end_line, 4);
    }

    #[test]
    fn synthetic_result_between_assistants_does_not_open_a_turn() {
        let turns = group_turns(vec![
            user("first", 1),
            assistant("a", 2),
            synthetic_result("result", 3),
            user("second", 4),
        ]);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].tool_results.len(), 1);
        assert_eq!(turns[1].user_message.text, "second");
    }

    #[test]
    fn real_user_message_closes_the_open_turn() {
        let turns = group_turns(vec![
            user("one", 1),
            assistant("a1", 2),
            user("two", 3),
            assistant("a2", 4),
        ]);
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn leading_assistant_messages_are_discarded() {
        let turns = group_turns(vec![assistant("orphan", 1), user("question", 2)]);
        assert_eq!(turns.len(), 1);
        assert!(turns[0].assistant_messages.is_empty());
    }

    #[test]
    fn assistant_tool_calls_merge_into_turn_arrays() {
        let mut calling = assistant("using a tool", 2);
        calling.tool_calls.push(ToolCall {
            name: "Bash".into(),
            id: "t9".into(),
            input: serde_json::json!({"command": "ls"}),
        });

        let turns = group_turns(vec![user("go", 1), calling]);
        assert_eq!(turns[0].tool_calls.len(), 1);
        assert_eq!(turns[0].tool_calls[0].name, "Bash");
    }
}
