//! Chat backend HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_protocol::CreatedChat;
use futures::StreamExt;
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::error::{BackendError, BackendResult};
use super::{ByteStream, ChatBackend};

/// Client for the chat backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    /// HTTP client.
    client: Client,
    /// Base URL for the backend (e.g., "http://localhost:8000").
    base_url: String,
}

impl HttpChatBackend {
    /// Create a new backend client.
    ///
    /// Only the connection phase is bounded by `connect_timeout`; a reply
    /// stream may stay open for as long as the backend keeps it open.
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Option<Duration>,
    ) -> BackendResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> BackendResult<reqwest::Response> {
        request.send().await.map_err(|e| {
            if e.is_connect() {
                BackendError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            } else {
                BackendError::RequestFailed(e)
            }
        })
    }

    /// Handle response and parse JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        what: &str,
    ) -> BackendResult<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| BackendError::ParseError(format!("{}: {}", what, e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(BackendError::NotFound(what.to_string()))
        } else {
            Err(status_error(response).await)
        }
    }
}

async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    BackendError::Status { status, body }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn create_chat(&self) -> BackendResult<CreatedChat> {
        let url = self.url("/chat/create");
        let response = self.send(self.client.post(&url), &url).await?;
        self.handle_response(response, "created chat").await
    }

    async fn stream_chat(
        &self,
        chat_id: i64,
        message: &str,
        include_processing_info: bool,
    ) -> BackendResult<ByteStream> {
        let url = self.url("/chat/stream");
        debug!("Opening chat stream for chat {} at {}", chat_id, url);

        let request = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .query(&[
                ("chat_id", chat_id.to_string()),
                ("message_content", message.to_string()),
                ("include_processing_info", include_processing_info.to_string()),
            ]);
        let response = self.send(request, &url).await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(BackendError::from));
        Ok(Box::pin(stream))
    }

    async fn chat_info(&self) -> BackendResult<Value> {
        let url = self.url("/chat/info");
        let response = self.send(self.client.get(&url), &url).await?;
        self.handle_response(response, "chat info").await
    }

    async fn message_processing(&self, message_id: &str) -> BackendResult<Value> {
        let url = self.url(&format!("/chat/messages/{}/processing", message_id));
        let response = self.send(self.client.get(&url), &url).await?;
        self.handle_response(response, "processing info").await
    }

    async fn message_cache(&self, message_id: &str) -> BackendResult<Value> {
        let url = self.url(&format!("/chat/messages/{}/cache", message_id));
        let response = self.send(self.client.get(&url), &url).await?;
        self.handle_response(response, "cache info").await
    }
}
