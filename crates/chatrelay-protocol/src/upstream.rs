//! Payload shapes of the chat backend's named-event stream.
//!
//! ```text
//! event: message_created
//! data: {"message_id": "42", "cache_hit": false}
//!
//! data: {"type": "token", "content": "Hel"}
//!
//! event: done
//! data: {"content": "[END]", "message_id": "42"}
//! ```
//!
//! Lifecycle payloads are forwarded to clients untouched, so only the fields
//! the relay itself acts on are typed here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Payload of an unnamed `data:` line carrying a text delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Payload of the `done` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub message_id: Option<String>,
}

/// Payload of the `message_created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreatedPayload {
    #[serde(default, deserialize_with = "lenient_id")]
    pub message_id: Option<String>,
}

/// Accept ids sent as either JSON strings or integers.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value))
}

/// Extract `message_id` from an arbitrary lifecycle payload.
pub fn message_id_of(payload: &Value) -> Option<String> {
    payload.get("message_id").and_then(id_from_value)
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_done_payload_with_numeric_id() {
        let done: DonePayload =
            serde_json::from_str(r#"{"content":"[END]","message_id":17}"#).unwrap();
        assert_eq!(done.content, "[END]");
        assert_eq!(done.message_id.as_deref(), Some("17"));
    }

    #[test]
    fn test_done_payload_without_id() {
        let done: DonePayload = serde_json::from_str(r#"{"content":"[END]"}"#).unwrap();
        assert_eq!(done.message_id, None);
    }

    #[test]
    fn test_token_payload() {
        let token: TokenPayload =
            serde_json::from_str(r#"{"type":"token","content":"llo"}"#).unwrap();
        assert_eq!(token.kind.as_deref(), Some("token"));
        assert_eq!(token.content, "llo");
    }

    #[test]
    fn test_message_id_of() {
        assert_eq!(message_id_of(&json!({"message_id": "m-1"})).as_deref(), Some("m-1"));
        assert_eq!(message_id_of(&json!({"message_id": 5})).as_deref(), Some("5"));
        assert_eq!(message_id_of(&json!({"message_id": ""})), None);
        assert_eq!(message_id_of(&json!({})), None);
    }
}
