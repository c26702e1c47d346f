//! Conversation state and frame application.

use chatrelay_protocol::upstream::message_id_of;
use chatrelay_protocol::{CacheHit, CacheInfo, OutboundFrame, ProcessingEventKind, ProcessingInfo};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::model::{ERROR_MESSAGE, Message};

/// Result of applying one frame to the streaming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The stream continues.
    Pending,
    /// The terminal token arrived.
    Completed { message_id: Option<String> },
    /// An `error` frame arrived; the message now shows [`ERROR_MESSAGE`].
    Failed(String),
}

/// Ordered message list plus the backend session id.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    chat_id: Option<i64>,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A fresh conversation opening with the assistant's greeting.
    pub fn new() -> Self {
        Self {
            chat_id: None,
            messages: vec![Message::assistant(crate::model::WELCOME_MESSAGE)],
        }
    }

    /// Resume an existing backend session.
    pub fn with_chat_id(chat_id: i64) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..Self::new()
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.chat_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Whether any assistant reply is still streaming.
    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(|m| m.is_streaming)
    }

    /// Append a user message and return its id.
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        let message = Message::user(content);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Append an empty streaming assistant message and return its id.
    pub fn start_assistant(&mut self) -> String {
        let message = Message::streaming_assistant();
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Apply one frame to the streaming message `target`.
    ///
    /// Token frames append and must arrive in order. Lifecycle merges
    /// replace fields, so replaying a `processing_event` is harmless.
    pub fn apply(&mut self, target: &str, frame: OutboundFrame) -> Applied {
        if let OutboundFrame::ChatId { chat_id } = frame {
            debug!("Session id is now {}", chat_id);
            self.chat_id = Some(chat_id);
            return Applied::Pending;
        }

        let Some(message) = self.message_mut(target) else {
            warn!("Dropping frame for unknown message {}", target);
            return Applied::Pending;
        };

        match frame {
            OutboundFrame::ChatId { .. } => Applied::Pending,
            OutboundFrame::Token {
                token,
                done: false,
                message_id,
            } => {
                message.content.push_str(&token);
                if message.message_id.is_none() {
                    message.message_id = message_id;
                }
                Applied::Pending
            }
            OutboundFrame::Token {
                done: true,
                message_id,
                ..
            } => {
                message.is_streaming = false;
                if message_id.is_some() {
                    message.message_id = message_id;
                }
                Applied::Completed {
                    message_id: message.message_id.clone(),
                }
            }
            OutboundFrame::ProcessingEvent { event, data } => {
                merge_lifecycle(message, event, &data);
                Applied::Pending
            }
            OutboundFrame::Error { error, .. } => {
                fail_message(message);
                Applied::Failed(error)
            }
        }
    }

    /// Replace `target`'s content with [`ERROR_MESSAGE`] and stop streaming.
    pub fn fail(&mut self, target: &str) {
        if let Some(message) = self.message_mut(target) {
            fail_message(message);
        }
    }

    /// Stop streaming `target`, keeping whatever content arrived.
    pub fn cancel(&mut self, target: &str) {
        if let Some(message) = self.message_mut(target) {
            message.is_streaming = false;
        }
    }

    /// Attach persisted statistics fetched after completion.
    pub fn merge_stats(
        &mut self,
        target: &str,
        processing: Option<ProcessingInfo>,
        cache: Option<CacheInfo>,
    ) {
        let Some(message) = self.message_mut(target) else {
            return;
        };
        if processing.is_some() {
            message.processing_info = processing;
        }
        if cache.is_some() {
            message.cache_info = cache;
        }
    }

    /// Flip the stats panel of `target`. Returns the new state.
    pub fn toggle_stats(&mut self, target: &str) -> bool {
        match self.message_mut(target) {
            Some(message) => {
                message.show_stats = !message.show_stats;
                message.show_stats
            }
            None => false,
        }
    }
}

fn fail_message(message: &mut Message) {
    message.content = ERROR_MESSAGE.to_string();
    message.is_streaming = false;
}

fn merge_lifecycle(message: &mut Message, event: ProcessingEventKind, data: &Value) {
    if let Some(id) = message_id_of(data) {
        message.message_id = Some(id);
    }

    let info = message
        .processing_info
        .get_or_insert_with(ProcessingInfo::default);
    if info.message_id.is_none() {
        info.message_id = message.message_id.clone();
    }

    if !info.is_complete() {
        match event {
            ProcessingEventKind::MessageCreated => {}
            ProcessingEventKind::ProcessingStarted => {
                set_timestamp(&mut info.start_timestamp, data, "start_timestamp");
            }
            ProcessingEventKind::FirstToken => {
                set_timestamp(
                    &mut info.first_token_timestamp,
                    data,
                    "first_token_timestamp",
                );
            }
            ProcessingEventKind::ProcessingCompleted => {
                set_timestamp(&mut info.end_timestamp, data, "end_timestamp");
            }
        }
    }

    if let Some(raw) = data.get("cache_hit").filter(|v| !v.is_null()) {
        match serde_json::from_value::<CacheHit>(raw.clone()) {
            Ok(hit) => message.cache_info = Some(hit.into_cache_info(message.message_id.clone())),
            Err(e) => warn!("Ignoring malformed cache_hit {}: {}", raw, e),
        }
    }
}

fn set_timestamp(slot: &mut Option<String>, data: &Value, field: &str) {
    if let Some(ts) = data.get(field).and_then(Value::as_str) {
        *slot = Some(ts.to_string());
    }
}
