//! Client side of the chatrelay frame stream.
//!
//! - [`FrameDecoder`] turns proxy response bytes back into
//!   [`OutboundFrame`](chatrelay_protocol::OutboundFrame)s.
//! - [`Conversation`] applies frames to the message list.
//! - [`ChatClient`] sends messages, owns the single in-flight request and
//!   publishes the conversation through a `watch` channel.
//! - [`stats`] formats processing statistics for display.

pub mod client;
pub mod consumer;
pub mod conversation;
pub mod error;
pub mod model;
pub mod stats;

pub use client::{ChatClient, ClientConfig};
pub use consumer::FrameDecoder;
pub use conversation::{Applied, Conversation};
pub use error::{ClientError, ClientResult};
pub use model::{ERROR_MESSAGE, Message, Sender, WELCOME_MESSAGE};
