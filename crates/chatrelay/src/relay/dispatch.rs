//! Event re-dispatcher.
//!
//! The backend speaks one of two stream shapes:
//!
//! - **Named events**: `event: <name>` followed by a JSON `data:` line. Text
//!   deltas arrive as unnamed `data: {"type":"token","content":...}` lines and
//!   the stream ends with `event: done` / `data: {"content":"[END]"}`.
//! - **Bare sentinel**: only `data:` lines. Each payload is a raw text delta
//!   and the literal `[END]` ends the stream.
//!
//! Both are implementations of [`UpstreamProtocol`]. In [`ProtocolMode::Auto`]
//! the dispatcher treats the stream as bare until the first `event:` line is
//! observed and as named events from then on.
//!
//! The pending event name is consumed by the next `data:` line whether or not
//! that line produces a frame. Blank lines do not reset it.

use chatrelay_protocol::upstream::{DonePayload, TokenPayload, message_id_of};
use chatrelay_protocol::{LineSplitter, OutboundFrame, ProcessingEventKind, SENTINEL, SseLine};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which upstream stream format to expect.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    /// Probe: bare sentinel until an `event:` line shows up.
    #[default]
    Auto,
    NamedEvents,
    BareSentinel,
}

/// Outcome of handling one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Skip,
    Emit(OutboundFrame),
    /// Emit and stop reading upstream.
    Finish(OutboundFrame),
}

/// State threaded through the tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchState {
    /// Set by `event:`, taken by the next `data:`.
    pub pending_event: Option<String>,
    /// Sticky across frames; updated by `message_created`.
    pub last_message_id: Option<String>,
}

/// One upstream stream format.
pub trait UpstreamProtocol: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle a `data:` payload. `event` is the event name that was pending
    /// when the line arrived; it has already been cleared from `state`.
    fn on_data(&self, event: Option<&str>, payload: &str, state: &mut DispatchState) -> Step;
}

/// `event:` + JSON `data:` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedEvents;

impl UpstreamProtocol for NamedEvents {
    fn name(&self) -> &'static str {
        "named_events"
    }

    fn on_data(&self, event: Option<&str>, payload: &str, state: &mut DispatchState) -> Step {
        match event {
            None => {
                if payload.trim() == SENTINEL {
                    return Step::Finish(OutboundFrame::finished(state.last_message_id.clone()));
                }
                match serde_json::from_str::<TokenPayload>(payload) {
                    Ok(token) if token.kind.as_deref().is_none_or(|k| k == "token") => Step::Emit(
                        OutboundFrame::token(token.content, state.last_message_id.clone()),
                    ),
                    Ok(other) => {
                        debug!("Ignoring unnamed payload of type {:?}", other.kind);
                        Step::Skip
                    }
                    Err(e) => {
                        warn!("Skipping malformed token payload: {} ({})", e, payload);
                        Step::Skip
                    }
                }
            }
            Some("start") => {
                debug!("Upstream stream started: {}", payload);
                Step::Skip
            }
            Some("done") => match serde_json::from_str::<DonePayload>(payload) {
                Ok(done) if done.content == SENTINEL => {
                    let message_id = done.message_id.or_else(|| state.last_message_id.clone());
                    Step::Finish(OutboundFrame::finished(message_id))
                }
                Ok(done) => {
                    debug!("Ignoring done event without sentinel: {:?}", done.content);
                    Step::Skip
                }
                Err(e) => {
                    warn!("Skipping malformed done payload: {} ({})", e, payload);
                    Step::Skip
                }
            },
            Some(name) => {
                let Some(kind) = ProcessingEventKind::from_event_name(name) else {
                    debug!("Ignoring unknown upstream event '{}'", name);
                    return Step::Skip;
                };
                match serde_json::from_str::<Value>(payload) {
                    Ok(data) => {
                        if kind == ProcessingEventKind::MessageCreated {
                            state.last_message_id =
                                message_id_of(&data).or(state.last_message_id.take());
                        }
                        Step::Emit(OutboundFrame::ProcessingEvent { event: kind, data })
                    }
                    Err(e) => {
                        warn!("Skipping malformed {} payload: {} ({})", kind, e, payload);
                        Step::Skip
                    }
                }
            }
        }
    }
}

/// Raw `data:` deltas terminated by `[END]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareSentinel;

impl UpstreamProtocol for BareSentinel {
    fn name(&self) -> &'static str {
        "bare_sentinel"
    }

    fn on_data(&self, _event: Option<&str>, payload: &str, state: &mut DispatchState) -> Step {
        if payload.trim() == SENTINEL {
            Step::Finish(OutboundFrame::finished(state.last_message_id.clone()))
        } else {
            Step::Emit(OutboundFrame::token(payload, state.last_message_id.clone()))
        }
    }
}

/// Line-level state machine over one upstream stream.
#[derive(Debug)]
pub struct Dispatcher {
    mode: ProtocolMode,
    saw_event_line: bool,
    finished: bool,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            mode,
            saw_event_line: false,
            finished: false,
            state: DispatchState::default(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The protocol currently in effect.
    pub fn protocol(&self) -> &'static dyn UpstreamProtocol {
        match self.mode {
            ProtocolMode::NamedEvents => &NamedEvents,
            ProtocolMode::BareSentinel => &BareSentinel,
            ProtocolMode::Auto if self.saw_event_line => &NamedEvents,
            ProtocolMode::Auto => &BareSentinel,
        }
    }

    pub fn on_line(&mut self, line: &str) -> Step {
        if self.finished {
            return Step::Skip;
        }

        match SseLine::parse(line) {
            SseLine::Event(name) => {
                self.saw_event_line = true;
                self.state.pending_event = (!name.is_empty()).then_some(name);
                Step::Skip
            }
            SseLine::Data(payload) => {
                let event = self.state.pending_event.take();
                let step = self
                    .protocol()
                    .on_data(event.as_deref(), &payload, &mut self.state);
                if matches!(step, Step::Finish(_)) {
                    self.finished = true;
                }
                step
            }
            SseLine::Blank => Step::Skip,
            SseLine::Comment(text) => {
                trace!("Upstream comment: {}", text);
                Step::Skip
            }
            SseLine::Other(text) => {
                trace!("Ignoring upstream line: {}", text);
                Step::Skip
            }
        }
    }

    /// Terminal frame for a stream that ended without one, or `None` if the
    /// stream already finished.
    pub fn implicit_completion(&mut self) -> Option<OutboundFrame> {
        if self.finished {
            return None;
        }
        self.finished = true;
        debug!(
            "Upstream ended without a terminal event ({}); completing implicitly",
            self.protocol().name()
        );
        Some(OutboundFrame::finished(self.state.last_message_id.clone()))
    }
}

/// Bytes in, frames out.
#[derive(Debug)]
pub struct Reframer {
    splitter: LineSplitter,
    dispatcher: Dispatcher,
}

impl Reframer {
    pub fn new(mode: ProtocolMode) -> Self {
        Self {
            splitter: LineSplitter::new(),
            dispatcher: Dispatcher::new(mode),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.dispatcher.is_finished()
    }

    /// Frames completed by `chunk`. Nothing is returned after the terminal frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        for line in self.splitter.push(chunk) {
            if self.apply(&line, &mut frames) {
                break;
            }
        }
        frames
    }

    /// Flush the unterminated tail and close the stream.
    pub fn finish(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        if let Some(line) = self.splitter.finish() {
            self.apply(&line, &mut frames);
        }
        frames.extend(self.dispatcher.implicit_completion());
        frames
    }

    fn apply(&mut self, line: &str, frames: &mut Vec<OutboundFrame>) -> bool {
        match self.dispatcher.on_line(line) {
            Step::Skip => false,
            Step::Emit(frame) => {
                frames.push(frame);
                false
            }
            Step::Finish(frame) => {
                frames.push(frame);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIFECYCLE: &str = "event: start\n\
data: {\"chat_id\": 7}\n\
\n\
event: message_created\n\
data: {\"message_id\": \"m-42\", \"cache_hit\": false}\n\
\n\
event: processing_started\n\
data: {\"start_timestamp\": \"2025-03-01T10:00:00Z\"}\n\
\n\
data: {\"type\": \"token\", \"content\": \"He\"}\n\
\n\
event: first_token\n\
data: {\"first_token_timestamp\": \"2025-03-01T10:00:01Z\"}\n\
\n\
data: {\"type\": \"token\", \"content\": \"llo\"}\n\
\n\
event: processing_completed\n\
data: {\"end_timestamp\": \"2025-03-01T10:00:02Z\", \"cache_hit\": false}\n\
\n\
event: done\n\
data: {\"content\": \"[END]\"}\n\
\n";

    fn run(mode: ProtocolMode, input: &str) -> Vec<OutboundFrame> {
        let mut reframer = Reframer::new(mode);
        let mut frames = reframer.feed(input.as_bytes());
        frames.extend(reframer.finish());
        frames
    }

    fn kinds(frames: &[OutboundFrame]) -> Vec<&'static str> {
        frames
            .iter()
            .map(|f| match f {
                OutboundFrame::ChatId { .. } => "chat_id",
                OutboundFrame::ProcessingEvent { event, .. } => event.as_str(),
                OutboundFrame::Token { done: false, .. } => "token",
                OutboundFrame::Token { done: true, .. } => "done",
                OutboundFrame::Error { .. } => "error",
            })
            .collect()
    }

    fn text(frames: &[OutboundFrame]) -> String {
        frames
            .iter()
            .filter_map(|f| match f {
                OutboundFrame::Token { token, done: false, .. } => Some(token.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_named_lifecycle_order() {
        let frames = run(ProtocolMode::Auto, LIFECYCLE);
        assert_eq!(
            kinds(&frames),
            vec![
                "message_created",
                "processing_started",
                "token",
                "first_token",
                "token",
                "processing_completed",
                "done",
            ]
        );
        assert_eq!(text(&frames), "Hello");
    }

    #[test]
    fn test_message_id_is_sticky_and_used_for_done() {
        let frames = run(ProtocolMode::NamedEvents, LIFECYCLE);
        for frame in &frames {
            if let OutboundFrame::Token { message_id, .. } = frame {
                assert_eq!(message_id.as_deref(), Some("m-42"));
            }
        }
        assert_eq!(frames.last(), Some(&OutboundFrame::finished(Some("m-42".into()))));
    }

    #[test]
    fn test_done_prefers_its_own_message_id() {
        let input = "event: message_created\ndata: {\"message_id\":\"m-1\"}\n\n\
event: done\ndata: {\"content\":\"[END]\",\"message_id\":\"m-2\"}\n\n";
        let frames = run(ProtocolMode::Auto, input);
        assert_eq!(frames.last(), Some(&OutboundFrame::finished(Some("m-2".into()))));
    }

    #[test]
    fn test_processing_payload_is_forwarded_verbatim() {
        let frames = run(ProtocolMode::Auto, LIFECYCLE);
        assert_eq!(
            frames[0],
            OutboundFrame::ProcessingEvent {
                event: ProcessingEventKind::MessageCreated,
                data: json!({"message_id": "m-42", "cache_hit": false}),
            }
        );
    }

    #[test]
    fn test_event_name_resets_after_data_line() {
        // The second data line has no event of its own and must be read as a
        // token, not as another first_token event.
        let input = "event: first_token\n\
data: {\"first_token_timestamp\":\"t1\"}\n\
data: {\"type\":\"token\",\"content\":\"A\"}\n";
        let frames = run(ProtocolMode::NamedEvents, input);
        assert_eq!(kinds(&frames), vec!["first_token", "token", "done"]);
    }

    #[test]
    fn test_blank_line_does_not_reset_event_name() {
        let input = "event: processing_started\n\n\ndata: {\"start_timestamp\":\"t0\"}\n";
        let frames = run(ProtocolMode::NamedEvents, input);
        assert_eq!(kinds(&frames), vec!["processing_started", "done"]);
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        let input = "data: {\"type\":\"token\",\"content\":\"A\"}\n\n\
data: {not json\n\n\
data: {\"type\":\"token\",\"content\":\"B\"}\n\n\
event: done\ndata: {\"content\":\"[END]\"}\n\n";
        let frames = run(ProtocolMode::NamedEvents, input);
        assert_eq!(kinds(&frames), vec!["token", "token", "done"]);
        assert_eq!(text(&frames), "AB");
    }

    #[test]
    fn test_malformed_named_payload_still_consumes_event() {
        let input = "event: first_token\ndata: oops\ndata: {\"type\":\"token\",\"content\":\"x\"}\n";
        let frames = run(ProtocolMode::NamedEvents, input);
        assert_eq!(kinds(&frames), vec!["token", "done"]);
    }

    #[test]
    fn test_start_and_unknown_events_emit_nothing() {
        let input = "event: start\ndata: {}\n\nevent: heartbeat\ndata: {}\n\n\
event: done\ndata: {\"content\":\"[END]\"}\n\n";
        let frames = run(ProtocolMode::NamedEvents, input);
        assert_eq!(kinds(&frames), vec!["done"]);
    }

    #[test]
    fn test_done_without_sentinel_does_not_finish() {
        let input = "event: done\ndata: {\"content\":\"partial\"}\n\n\
data: {\"type\":\"token\",\"content\":\"more\"}\n\n";
        let mut reframer = Reframer::new(ProtocolMode::NamedEvents);
        let frames = reframer.feed(input.as_bytes());
        assert!(!reframer.is_finished());
        assert_eq!(kinds(&frames), vec!["token"]);
    }

    #[test]
    fn test_bare_sentinel_without_event_lines() {
        let frames = run(ProtocolMode::Auto, "data: Hel\n\ndata: lo\n\ndata: [END]\n\n");
        assert_eq!(kinds(&frames), vec!["token", "token", "done"]);
        assert_eq!(text(&frames), "Hello");
    }

    #[test]
    fn test_bare_sentinel_forwards_payload_untouched() {
        let frames = run(ProtocolMode::BareSentinel, "data: {\"type\":\"token\"}\n\ndata: [END]\n");
        assert_eq!(frames[0], OutboundFrame::token("{\"type\":\"token\"}", None));
    }

    #[test]
    fn test_bare_sentinel_in_named_stream() {
        let input = "event: message_created\ndata: {\"message_id\":\"m-1\"}\n\ndata: [END]\n\n";
        let frames = run(ProtocolMode::Auto, input);
        assert_eq!(frames.last(), Some(&OutboundFrame::finished(Some("m-1".into()))));
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_auto_mode_switches_on_first_event_line() {
        let mut dispatcher = Dispatcher::new(ProtocolMode::Auto);
        assert_eq!(dispatcher.protocol().name(), "bare_sentinel");
        dispatcher.on_line("event: start");
        assert_eq!(dispatcher.protocol().name(), "named_events");
    }

    #[test]
    fn test_nothing_after_terminal_frame() {
        let input = "data: [END]\n\ndata: late\n\n";
        let mut reframer = Reframer::new(ProtocolMode::BareSentinel);
        let frames = reframer.feed(input.as_bytes());
        assert_eq!(kinds(&frames), vec!["done"]);
        assert!(reframer.feed(b"data: later\n").is_empty());
        assert!(reframer.finish().is_empty());
    }

    #[test]
    fn test_eof_without_terminal_completes_implicitly() {
        let frames = run(
            ProtocolMode::NamedEvents,
            "event: message_created\ndata: {\"message_id\":\"m-3\"}\n\ndata: {\"type\":\"token\",\"content\":\"x\"}",
        );
        assert_eq!(kinds(&frames), vec!["message_created", "token", "done"]);
        assert_eq!(frames.last(), Some(&OutboundFrame::finished(Some("m-3".into()))));
    }

    #[test]
    fn test_chunking_does_not_change_frames() {
        let expected = run(ProtocolMode::Auto, LIFECYCLE);
        let bytes = LIFECYCLE.as_bytes();
        for size in [1, 2, 3, 7, 16, 64] {
            let mut reframer = Reframer::new(ProtocolMode::Auto);
            let mut frames = Vec::new();
            for chunk in bytes.chunks(size) {
                frames.extend(reframer.feed(chunk));
            }
            frames.extend(reframer.finish());
            assert_eq!(frames, expected, "chunk size {}", size);
        }
    }
}
