//! Translate inbound chat history into Gemini `contents`.
//!
//! The inbound body is parsed leniently: malformed messages are dropped rather
//! than failing the whole request, so parsing goes through `serde_json::Value`
//! instead of a strict derive.

use serde_json::Value;

use super::gemini_types::{Content, GeminiRole};

/// An inbound conversational turn that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Option<String>,
    pub content: String,
}

impl ChatMessage {
    /// Keep a message only if its `content` is a string with non-whitespace text.
    /// A missing or non-string `role` is kept as `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let content = value.get("content")?.as_str()?;
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            role: value.get("role").and_then(Value::as_str).map(str::to_string),
            content: content.to_string(),
        })
    }

    pub fn gemini_role(&self) -> GeminiRole {
        map_role(self.role.as_deref())
    }
}

/// `"assistant"` becomes `model`; anything else, including no role, is `user`.
pub fn map_role(role: Option<&str>) -> GeminiRole {
    match role {
        Some("assistant") => GeminiRole::Model,
        _ => GeminiRole::User,
    }
}

/// The fields of an inbound relay request.
#[derive(Debug, Clone, Default)]
pub struct RelayRequest {
    pub messages: Value,
    pub model: Option<String>,
}

impl RelayRequest {
    /// Pull `messages` and `model` out of a parsed body. A body that is not a
    /// JSON object has neither field.
    pub fn from_value(body: &Value) -> Self {
        let model = body
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Self {
            messages: body.get("messages").cloned().unwrap_or(Value::Null),
            model,
        }
    }

    /// The requested model, or `default_model` when none was given.
    pub fn target_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default_model)
    }

    pub fn contents(&self) -> Vec<Content> {
        chat_to_gemini(&self.messages)
    }
}

/// Order-preserving conversion; a non-array input yields no contents.
pub fn chat_to_gemini(messages: &Value) -> Vec<Content> {
    let Some(messages) = messages.as_array() else {
        return Vec::new();
    };

    messages
        .iter()
        .filter_map(ChatMessage::from_value)
        .map(|msg| Content::text(msg.gemini_role(), msg.content))
        .collect()
}
