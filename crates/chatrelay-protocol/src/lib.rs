//! Wire contracts for chatrelay.
//!
//! This crate defines the formats exchanged across both hops of the relay:
//!
//! ```text
//! Client <--[SSE: outbound frames]-- Proxy <--[SSE: named events | bare sentinel]-- Chat backend
//! ```
//!
//! The client only understands [`frames::OutboundFrame`]. The proxy translates
//! whatever the backend speaks into that shape.
//!
//! ## Design Principles
//!
//! 1. **One frame per SSE record.** Every outbound record is `data: <json>\n\n`.
//! 2. **Exactly one terminal frame.** A `token` frame with `done = true` ends a
//!    message stream, and nothing follows it.
//! 3. **Tokenizing is shared.** Both hops split byte chunks with the same
//!    [`sse::LineSplitter`], which carries partial lines across chunk boundaries.

pub mod frames;
pub mod request;
pub mod sse;
pub mod stats;
pub mod upstream;

pub use frames::{OutboundFrame, ProcessingEventKind};
pub use request::ChatRequest;
pub use sse::{LineSplitter, SENTINEL, SseLine};
pub use stats::{CacheHit, CacheInfo, ChatInfo, CreatedChat, ProcessingInfo};
