//! Upstream-to-client SSE re-framing.
//!
//! ```text
//! backend bytes ──▶ LineSplitter ──▶ Dispatcher ──▶ mpsc ──▶ SSE response body
//!                   (carry-over)     (protocol)     (task)
//! ```
//!
//! [`Reframer`] is the synchronous core and is driven chunk by chunk.
//! [`writer`] owns the async read loop and the HTTP response.

mod dispatch;
pub mod writer;

pub use dispatch::{
    BareSentinel, DispatchState, Dispatcher, NamedEvents, ProtocolMode, Reframer, Step,
    UpstreamProtocol,
};
pub use writer::{RelayOutcome, relay_frames, spawn_relay, sse_response};
