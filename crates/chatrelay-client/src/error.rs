//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request to the proxy could not be sent.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The proxy answered with a non-success status before streaming.
    #[error("proxy returned {0}")]
    Status(StatusCode),

    /// Reading the response body failed mid-stream.
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The proxy reported an in-band `error` frame.
    #[error("backend error: {0}")]
    Backend(String),

    /// A newer send replaced this one.
    #[error("request cancelled")]
    Cancelled,

    #[error("message is empty")]
    EmptyMessage,
}
