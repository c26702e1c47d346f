//! API request handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use chatrelay_protocol::{ChatRequest, OutboundFrame};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::relay::{spawn_relay, sse_response};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Relay one chat turn as `text/event-stream`.
///
/// Everything up to the backend's response head is fallible with a JSON
/// error body. After that the response is committed and failures arrive
/// as in-band `error` frames.
#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    let backend = state.backend()?;

    let mut preamble = Vec::new();
    let chat_id = match request.chat_id {
        Some(id) => id,
        None => {
            let created = backend.create_chat().await?;
            info!(chat_id = created.id, "Created chat");
            preamble.push(OutboundFrame::ChatId {
                chat_id: created.id,
            });
            created.id
        }
    };

    let include_processing_info = request
        .include_processing_info
        .unwrap_or(state.include_processing_info);
    debug!(chat_id, include_processing_info, "Streaming chat reply");

    let upstream = backend
        .stream_chat(chat_id, &request.message, include_processing_info)
        .await?;

    let rx = spawn_relay(
        upstream,
        state.relay.protocol,
        preamble,
        state.relay.channel_capacity,
    );
    Ok(sse_response(rx))
}

/// Aggregate chat statistics.
pub async fn chat_info(State(state): State<AppState>) -> ApiResult<Response> {
    let info = state
        .backend()?
        .chat_info()
        .await
        .map_err(|e| ApiError::from_backend(e, "Chat info not found"))?;
    Ok(no_cache(info))
}

/// Persisted processing timestamps for one message.
pub async fn message_processing(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> ApiResult<Response> {
    let info = state
        .backend()?
        .message_processing(&message_id)
        .await
        .map_err(|e| ApiError::from_backend(e, "Processing info not found"))?;
    Ok(no_cache(info))
}

/// Persisted cache outcome for one message.
pub async fn message_cache(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> ApiResult<Response> {
    let info = state
        .backend()?
        .message_cache(&message_id)
        .await
        .map_err(|e| ApiError::from_backend(e, "Cache info not found"))?;
    Ok(no_cache(info))
}

fn no_cache(body: serde_json::Value) -> Response {
    ([(header::CACHE_CONTROL, "no-cache")], Json(body)).into_response()
}
