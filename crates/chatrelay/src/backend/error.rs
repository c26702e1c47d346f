//! Chat backend error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while talking to the chat backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No backend URL configured.
    #[error("BACKEND_URL is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Connection failed.
    #[error("Failed to connect to chat backend at {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Backend answered with a non-success status.
    #[error("Chat backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}
