//! OpenAI-format request shaping.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Chat message in the wire format the aggregator expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Prepend a role's instructions as a system message.
pub fn apply_role(messages: Vec<ChatMessage>, instructions: &str) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    out.push(ChatMessage::system(instructions));
    out.extend(messages);
    out
}

/// Same as [`apply_role`] for an opaque request body that is forwarded as is.
/// A missing or malformed `messages` field is replaced.
pub fn apply_role_to_body(body: &mut Value, instructions: &str) {
    let system = json!({ "role": "system", "content": instructions });
    match body.get_mut("messages").and_then(Value::as_array_mut) {
        Some(messages) => messages.insert(0, system),
        None => {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("messages".into(), Value::Array(vec![system]));
            }
        }
    }
}

/// Body for `/v1/chat/completions`.
pub fn chat_body(model: Option<&str>, messages: &[ChatMessage], stream: bool) -> Value {
    let mut body = json!({
        "messages": messages,
        "stream": stream,
    });
    if let Some(model) = model {
        body["model"] = json!(model);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_role_prepends_system() {
        let messages = vec![ChatMessage::new("user", "hi")];
        let out = apply_role(messages, "Be terse.");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ChatMessage::system("Be terse."));
        assert_eq!(out[1].role, "user");
    }

    #[test]
    fn test_apply_role_to_body() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
        });
        apply_role_to_body(&mut body, "Answer in French.");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Answer in French.");
        assert_eq!(body["messages"][1]["content"], "hi");

        let mut empty = json!({ "model": "gpt-4" });
        apply_role_to_body(&mut empty, "x");
        assert_eq!(empty["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_chat_body() {
        let body = chat_body(Some("gpt-4"), &[ChatMessage::new("user", "hi")], true);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["content"], "hi");

        let body = chat_body(None, &[], false);
        assert!(body.get("model").is_none());
    }
}
