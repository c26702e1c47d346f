//! Request body accepted by the proxy's `POST /chat`.

use serde::{Deserialize, Serialize};

/// A user message to relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Existing chat session. When absent the proxy creates one and
    /// announces it with a `chat_id` frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    /// Forwarded to the backend as `include_processing_info`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_processing_info: Option<bool>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chat_id: None,
            include_processing_info: None,
        }
    }

    pub fn chat_id(mut self, chat_id: Option<i64>) -> Self {
        self.chat_id = chat_id;
        self
    }

    pub fn include_processing_info(mut self, include: bool) -> Self {
        self.include_processing_info = Some(include);
        self
    }
}
