//! Decode the proxy's `text/event-stream` body into frames.

use chatrelay_protocol::{LineSplitter, OutboundFrame, SseLine};
use log::{trace, warn};

/// Incremental decoder for proxy response bytes.
///
/// Only `data:` lines carry frames. Other SSE fields and keep-alive
/// comments are dropped, as are payloads that fail to parse.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    splitter: LineSplitter,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<OutboundFrame> {
        self.splitter
            .push(chunk)
            .iter()
            .filter_map(|line| decode_line(line))
            .collect()
    }

    /// Flush an unterminated final line at end of body.
    pub fn finish(&mut self) -> Option<OutboundFrame> {
        self.splitter.finish().and_then(|line| decode_line(&line))
    }
}

fn decode_line(line: &str) -> Option<OutboundFrame> {
    match SseLine::parse(line) {
        SseLine::Data(payload) => match serde_json::from_str(&payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Skipping unparseable frame {:?}: {}", payload, e);
                None
            }
        },
        other => {
            trace!("Ignoring SSE line {:?}", other);
            None
        }
    }
}
