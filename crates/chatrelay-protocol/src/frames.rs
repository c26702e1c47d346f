//! Outbound frames: the contract between the proxy and its clients.
//!
//! Each frame travels as one SSE record, `data: <json>\n\n`, tagged by the
//! `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Frame envelope
// ============================================================================

/// All frame kinds the proxy emits, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A chat session was created for this request. Always the first frame
    /// when present.
    ChatId { chat_id: i64 },

    /// Message lifecycle signal forwarded from the backend.
    ProcessingEvent {
        event: ProcessingEventKind,
        data: Value,
    },

    /// Text delta, or the terminal marker when `done` is true.
    Token {
        token: String,
        done: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Stream failed after it started. Always terminal.
    Error {
        error: String,
        #[serde(default = "default_true")]
        done: bool,
    },
}

fn default_true() -> bool {
    true
}

impl OutboundFrame {
    pub fn token(token: impl Into<String>, message_id: Option<String>) -> Self {
        Self::Token {
            token: token.into(),
            done: false,
            message_id,
        }
    }

    /// The terminal frame for a message stream.
    pub fn finished(message_id: Option<String>) -> Self {
        Self::Token {
            token: String::new(),
            done: true,
            message_id,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            done: true,
        }
    }

    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Token { done, .. } => *done,
            Self::Error { .. } => true,
            _ => false,
        }
    }

    /// Render as a single SSE record.
    pub fn to_sse(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

// ============================================================================
// Processing lifecycle
// ============================================================================

/// Backend lifecycle events that are re-emitted as `processing_event` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingEventKind {
    MessageCreated,
    ProcessingStarted,
    FirstToken,
    ProcessingCompleted,
}

impl ProcessingEventKind {
    /// Map an upstream `event:` name onto a lifecycle kind.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "message_created" => Some(Self::MessageCreated),
            "processing_started" => Some(Self::ProcessingStarted),
            "first_token" => Some(Self::FirstToken),
            "processing_completed" => Some(Self::ProcessingCompleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCreated => "message_created",
            Self::ProcessingStarted => "processing_started",
            Self::FirstToken => "first_token",
            Self::ProcessingCompleted => "processing_completed",
        }
    }
}

impl std::fmt::Display for ProcessingEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
