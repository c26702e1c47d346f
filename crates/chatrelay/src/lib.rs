//! chatrelay: an SSE relay between a chat backend and browser clients.
//!
//! The proxy accepts one chat message per `POST /chat`, lazily creates a
//! backend chat session, and re-frames the backend's SSE reply into the
//! uniform [`chatrelay_protocol::OutboundFrame`] stream.

pub mod api;
pub mod backend;
pub mod config;
pub mod relay;
