//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, BackendResult, ChatBackend, HttpChatBackend};
use crate::config::{AppConfig, RelayConfig};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Chat backend; `None` while no backend URL is configured.
    backend: Option<Arc<dyn ChatBackend>>,
    /// Re-framing settings for `/chat`.
    pub relay: RelayConfig,
    /// Default for requests that omit `includeProcessingInfo`.
    pub include_processing_info: bool,
}

impl AppState {
    pub fn new(
        backend: Option<Arc<dyn ChatBackend>>,
        relay: RelayConfig,
        include_processing_info: bool,
    ) -> Self {
        Self {
            backend,
            relay,
            include_processing_info,
        }
    }

    /// Build state from configuration, constructing the HTTP backend when a
    /// URL is set.
    pub fn from_config(config: &AppConfig) -> BackendResult<Self> {
        let backend = match config.backend.url.as_deref() {
            Some(url) => {
                let timeout = config.backend.connect_timeout_secs.map(Duration::from_secs);
                let client = HttpChatBackend::new(url, timeout)?;
                Some(Arc::new(client) as Arc<dyn ChatBackend>)
            }
            None => None,
        };

        Ok(Self::new(
            backend,
            config.relay.clone(),
            config.backend.include_processing_info,
        ))
    }

    /// The configured backend, or [`BackendError::NotConfigured`].
    pub fn backend(&self) -> BackendResult<&dyn ChatBackend> {
        self.backend.as_deref().ok_or(BackendError::NotConfigured)
    }
}
