use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value_to_text;

/// A chat turn inside a structured (JSON array) prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
        }
    }

    pub fn content_text(&self) -> String {
        value_to_text(&self.content)
    }
}

/// Parse a rendered prompt as a chat-message array, if it is one
pub fn parse_chat_messages(prompt: &str) -> Option<Vec<ChatMessage>> {
    let trimmed = prompt.trim_start();
    if !trimmed.starts_with('[') {
        return None;
    }

    serde_json::from_str::<Vec<ChatMessage>>(prompt).ok()
}

/// The text a user actually "said" in a rendered prompt.
///
/// For chat-array prompts this is the content of the last turn, otherwise the
/// whole prompt.
pub fn last_input(prompt: &str) -> String {
    match serde_json::from_str::<Value>(prompt) {
        Ok(Value::Array(turns)) => turns
            .last()
            .and_then(|turn| turn.get("content"))
            .map(value_to_text)
            .unwrap_or_else(|| prompt.to_string()),
        _ => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_messages() {
        let prompt = r#"[{"role": "system", "content": "Be brief"}, {"role": "user", "content": "Hi"}]"#;
        let messages = parse_chat_messages(prompt).unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content_text(), "Hi");
    }

    #[test]
    fn test_parse_chat_messages_plain_text() {
        assert!(parse_chat_messages("Tell me a joke").is_none());
        assert!(parse_chat_messages("[not json").is_none());
    }

    #[test]
    fn test_last_input_uses_last_turn() {
        let prompt = r#"[{"role": "user", "content": "first"}, {"role": "user", "content": "second"}]"#;
        assert_eq!(last_input(prompt), "second");
    }

    #[test]
    fn test_last_input_plain_prompt() {
        assert_eq!(last_input("What is 2+2?"), "What is 2+2?");
    }
}
