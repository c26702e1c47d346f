//! Outbound SSE writer.
//!
//! The upstream read loop runs in its own task and hands frames to the
//! response body through a bounded channel. Every exit path closes the
//! channel after at most one terminal frame, so the client stream never
//! hangs open.

use std::convert::Infallible;
use std::fmt::Display;

use axum::http::{HeaderValue, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chatrelay_protocol::OutboundFrame;
use futures::{Stream, StreamExt};
use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::dispatch::{ProtocolMode, Reframer};

/// How a relay loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream sent its terminal event.
    Completed,
    /// Upstream closed without a terminal event; one was synthesized.
    ImplicitlyCompleted,
    /// Reading upstream failed; an error frame was sent.
    Failed(String),
    /// The client went away before the stream finished.
    ClientGone,
}

/// Drive `upstream` through a [`Reframer`], sending `preamble` first.
pub async fn relay_frames<S, E>(
    mut upstream: S,
    mode: ProtocolMode,
    preamble: Vec<OutboundFrame>,
    tx: mpsc::Sender<OutboundFrame>,
) -> RelayOutcome
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    for frame in preamble {
        if tx.send(frame).await.is_err() {
            return RelayOutcome::ClientGone;
        }
    }

    let mut reframer = Reframer::new(mode);

    while let Some(chunk) = upstream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = e.to_string();
                error!("Upstream stream failed: {}", message);
                let _ = tx.send(OutboundFrame::error(message.clone())).await;
                return RelayOutcome::Failed(message);
            }
        };

        for frame in reframer.feed(&bytes) {
            if tx.send(frame).await.is_err() {
                return RelayOutcome::ClientGone;
            }
        }

        if reframer.is_finished() {
            debug!("Upstream stream completed");
            return RelayOutcome::Completed;
        }
    }

    for frame in reframer.finish() {
        if tx.send(frame).await.is_err() {
            return RelayOutcome::ClientGone;
        }
    }
    RelayOutcome::ImplicitlyCompleted
}

/// Spawn the relay loop and return the frame receiver for the response body.
pub fn spawn_relay<S, E>(
    upstream: S,
    mode: ProtocolMode,
    preamble: Vec<OutboundFrame>,
    capacity: usize,
) -> mpsc::Receiver<OutboundFrame>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        match relay_frames(upstream, mode, preamble, tx).await {
            RelayOutcome::ClientGone => warn!("Client disconnected before the stream finished"),
            RelayOutcome::Failed(_) => {}
            outcome => debug!("Relay finished: {:?}", outcome),
        }
    });
    rx
}

/// Wrap a frame receiver as a `text/event-stream` response, one
/// `data: <json>` record per frame.
pub fn sse_response(rx: mpsc::Receiver<OutboundFrame>) -> Response {
    let stream = ReceiverStream::new(rx).map(|frame| {
        let event = match serde_json::to_string(&frame) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                error!("Failed to serialize frame: {}", e);
                Event::default().data(
                    serde_json::json!({"type": "error", "error": e.to_string(), "done": true})
                        .to_string(),
                )
            }
        };
        Ok::<_, Infallible>(event)
    });

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Disable nginx buffering if present
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
