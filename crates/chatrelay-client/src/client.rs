//! HTTP client for the relay proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chatrelay_protocol::{CacheInfo, ChatInfo, ChatRequest, OutboundFrame, ProcessingInfo};
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::consumer::FrameDecoder;
use crate::conversation::{Applied, Conversation};
use crate::error::{ClientError, ClientResult};
use crate::model::Message;

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy base URL, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// Sent as `includeProcessingInfo` on every request.
    pub include_processing_info: bool,
    /// Wait after completion before fetching persisted stats, giving the
    /// backend time to write them.
    pub stats_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            include_processing_info: true,
            stats_delay: Duration::from_millis(500),
        }
    }
}

/// The send currently allowed to write into the conversation.
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

/// Sends chat messages through the proxy and tracks the conversation.
///
/// At most one send streams at a time: starting a new one cancels the
/// previous reader, whose message keeps its partial text.
pub struct ChatClient {
    http: Client,
    config: ClientConfig,
    state: watch::Sender<Conversation>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_conversation(config, Conversation::new())
    }

    /// Start from an existing conversation, e.g. one resuming a chat id.
    pub fn with_conversation(mut config: ClientConfig, conversation: Conversation) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let (state, _) = watch::channel(conversation);
        Self {
            http: Client::new(),
            config,
            state,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Receive every conversation update.
    pub fn subscribe(&self) -> watch::Receiver<Conversation> {
        self.state.subscribe()
    }

    /// Copy of the current conversation.
    pub fn snapshot(&self) -> Conversation {
        self.state.borrow().clone()
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.state.borrow().chat_id()
    }

    /// Send `text` and stream the reply into the conversation.
    ///
    /// Returns the finished assistant message. On failure the message shows
    /// the apology text and the error is returned. A send replaced by a
    /// newer one returns [`ClientError::Cancelled`].
    pub async fn send(&self, text: &str) -> ClientResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let (generation, cancel) = self.claim_slot().await;

        let mut assistant_id = String::new();
        self.state.send_modify(|c| {
            c.push_user(text);
            assistant_id = c.start_assistant();
        });

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.stream_reply(&assistant_id, text) => result,
        };

        let outcome = match result {
            Ok(message_id) => {
                if let Some(message_id) = message_id {
                    self.load_stats(&assistant_id, &message_id).await;
                }
                Ok(())
            }
            Err(ClientError::Cancelled) => {
                debug!("Send superseded; keeping partial reply");
                self.state.send_modify(|c| c.cancel(&assistant_id));
                Err(ClientError::Cancelled)
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.state.send_modify(|c| c.fail(&assistant_id));
                Err(e)
            }
        };

        self.release_slot(generation).await;
        outcome?;

        self.state
            .borrow()
            .message(&assistant_id)
            .cloned()
            .ok_or_else(|| ClientError::Stream("assistant message vanished".to_string()))
    }

    /// Cancel the in-flight send, if any.
    pub async fn cancel(&self) {
        if let Some(in_flight) = self.in_flight.lock().await.take() {
            in_flight.cancel.cancel();
        }
    }

    /// Aggregate statistics from the proxy's `/chat/info`.
    pub async fn fetch_chat_info(&self) -> ClientResult<ChatInfo> {
        self.get_json("/chat/info").await
    }

    /// Persisted processing timestamps for a backend message id.
    pub async fn fetch_processing_info(&self, message_id: &str) -> ClientResult<ProcessingInfo> {
        self.get_json(&format!("/chat/messages/{}/processing", message_id))
            .await
    }

    /// Persisted cache outcome for a backend message id.
    pub async fn fetch_cache_info(&self, message_id: &str) -> ClientResult<CacheInfo> {
        self.get_json(&format!("/chat/messages/{}/cache", message_id))
            .await
    }

    async fn claim_slot(&self) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let mut slot = self.in_flight.lock().await;
        if let Some(previous) = slot.replace(InFlight {
            generation,
            cancel: cancel.clone(),
        }) {
            debug!("Cancelling in-flight send #{}", previous.generation);
            previous.cancel.cancel();
        }
        (generation, cancel)
    }

    async fn release_slot(&self, generation: u64) {
        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|f| f.generation == generation) {
            *slot = None;
        }
    }

    /// Post the message and apply frames until a terminal one. Returns the
    /// backend message id when known.
    async fn stream_reply(&self, assistant_id: &str, text: &str) -> ClientResult<Option<String>> {
        let request = ChatRequest::new(text)
            .chat_id(self.chat_id())
            .include_processing_info(self.config.include_processing_info);

        let response = self
            .http
            .post(format!("{}/chat", self.config.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ClientError::Stream(e.to_string()))?;
            for frame in decoder.push(&chunk) {
                if let Some(result) = self.apply(assistant_id, frame) {
                    return result;
                }
            }
        }
        if let Some(result) = decoder
            .finish()
            .and_then(|frame| self.apply(assistant_id, frame))
        {
            return result;
        }

        debug!("Proxy closed the stream without a terminal frame");
        self.state.send_modify(|c| c.cancel(assistant_id));
        Ok(None)
    }

    /// Apply one frame. `Some` once the stream is over, carrying its result.
    fn apply(
        &self,
        assistant_id: &str,
        frame: OutboundFrame,
    ) -> Option<ClientResult<Option<String>>> {
        let mut applied = Applied::Pending;
        self.state.send_modify(|c| applied = c.apply(assistant_id, frame));
        match applied {
            Applied::Pending => None,
            Applied::Completed { message_id } => Some(Ok(message_id)),
            Applied::Failed(error) => Some(Err(ClientError::Backend(error))),
        }
    }

    /// Wait for the backend to persist stats, then fetch both concurrently.
    /// Missing stats are not an error.
    async fn load_stats(&self, assistant_id: &str, message_id: &str) {
        if !self.config.stats_delay.is_zero() {
            tokio::time::sleep(self.config.stats_delay).await;
        }

        let (processing, cache) = futures::join!(
            self.fetch_processing_info(message_id),
            self.fetch_cache_info(message_id)
        );
        let processing = processing
            .inspect_err(|e| warn!("No processing info for message {}: {}", message_id, e))
            .ok();
        let cache = cache
            .inspect_err(|e| warn!("No cache info for message {}: {}", message_id, e))
            .ok();

        if processing.is_some() || cache.is_some() {
            info!("Loaded stats for message {}", message_id);
        }
        self.state
            .send_modify(|c| c.merge_stats(assistant_id, processing, cache));
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.config.base_url, path))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }
        Ok(response.json().await?)
    }
}
