//! Unified API error handling with structured responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::backend::BackendError;

/// API error type with structured responses.
///
/// Only produced before a stream starts; once frames flow, failures are
/// reported in-band as `error` frames.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Map a backend failure, using `not_found` as the message for a 404.
    pub fn from_backend(err: BackendError, not_found: &str) -> Self {
        match err {
            BackendError::NotFound(_) => Self::NotFound(not_found.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
            }
            _ => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(what) => Self::NotFound(format!("{} not found", what)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_not_found_maps_to_404() {
        let err = ApiError::from(BackendError::NotFound("processing info".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "processing info not found");
    }

    #[test]
    fn test_from_backend_uses_custom_not_found_message() {
        let err = ApiError::from_backend(
            BackendError::NotFound("cache info".into()),
            "Cache info not found",
        );
        assert_eq!(err.to_string(), "Cache info not found");
    }

    #[test]
    fn test_not_configured_maps_to_500() {
        let err = ApiError::from(BackendError::NotConfigured);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(err.to_string(), "BACKEND_URL is not configured");
    }

    #[test]
    fn test_error_response_shape() {
        let body = ErrorResponse {
            error: "Processing info not found".into(),
            code: "NOT_FOUND",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"Processing info not found","code":"NOT_FOUND"}"#
        );
    }
}
