//! Chat backend client module.
//!
//! [`ChatBackend`] is the seam between the HTTP API and the remote chat
//! service. [`HttpChatBackend`] is the production implementation.

mod client;
mod error;

pub use client::HttpChatBackend;
pub use error::{BackendError, BackendResult};

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chatrelay_protocol::CreatedChat;
use futures::Stream;
use serde_json::Value;

/// Raw upstream SSE bytes.
pub type ByteStream = Pin<Box<dyn Stream<Item = BackendResult<Bytes>> + Send>>;

/// Operations the relay needs from the chat backend.
///
/// Every call is attempted exactly once; retries are left to the caller.
/// Statistics bodies are returned as raw JSON and relayed unchanged.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a chat session (`POST /chat/create`).
    async fn create_chat(&self) -> BackendResult<CreatedChat>;

    /// Start streaming a reply (`POST /chat/stream`).
    ///
    /// Resolves once the response head has arrived with a success status.
    async fn stream_chat(
        &self,
        chat_id: i64,
        message: &str,
        include_processing_info: bool,
    ) -> BackendResult<ByteStream>;

    /// Aggregate statistics (`GET /chat/info`).
    async fn chat_info(&self) -> BackendResult<Value>;

    /// Persisted processing timestamps for a message.
    async fn message_processing(&self, message_id: &str) -> BackendResult<Value>;

    /// Persisted cache outcome for a message.
    async fn message_cache(&self, message_id: &str) -> BackendResult<Value>;
}
