//! Chat messages as the client displays them.

use chatrelay_protocol::{CacheInfo, ProcessingInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// First message of every new conversation.
pub const WELCOME_MESSAGE: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Replaces an assistant reply that failed.
pub const ERROR_MESSAGE: &str = "Sorry, there was an error getting a response. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry in the conversation.
///
/// Assistant messages are created empty with `is_streaming` set and are
/// mutated in place until the stream ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Local identifier.
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_streaming: bool,
    /// Backend message id, known once `message_created` or the final token arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_info: Option<ProcessingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_info: Option<CacheInfo>,
    /// Whether the stats panel is expanded.
    #[serde(default)]
    pub show_stats: bool,
}

impl Message {
    fn new(sender: Sender, content: impl Into<String>, is_streaming: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming,
            message_id: None,
            processing_info: None,
            cache_info: None,
            show_stats: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content, false)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content, false)
    }

    /// Empty assistant message awaiting tokens.
    pub fn streaming_assistant() -> Self {
        Self::new(Sender::Assistant, "", true)
    }

    /// Whether any persisted statistics are attached.
    pub fn has_stats(&self) -> bool {
        self.processing_info.is_some() || self.cache_info.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_assistant_starts_empty() {
        let msg = Message::streaming_assistant();
        assert_eq!(msg.sender, Sender::Assistant);
        assert!(msg.content.is_empty());
        assert!(msg.is_streaming);
        assert!(!msg.has_stats());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["sender"], "user");
        assert!(json.get("message_id").is_none());
    }
}
