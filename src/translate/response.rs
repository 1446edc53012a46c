use serde::Serialize;
use serde_json::Value;

/// Successful relay result: the flattened reply plus the untouched upstream payload.
#[derive(Debug, Clone, Serialize)]
pub struct RelayReply {
    pub reply: String,
    pub raw: Value,
}

impl RelayReply {
    pub fn from_upstream(raw: Value) -> Self {
        Self {
            reply: extract_reply(&raw),
            raw,
        }
    }
}

/// Concatenate the text of the first candidate's parts, in order.
/// Parts without a string `text` contribute nothing; a missing path yields `""`.
pub fn extract_reply(raw: &Value) -> String {
    raw.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}
