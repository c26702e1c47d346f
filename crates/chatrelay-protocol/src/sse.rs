//! Incremental SSE line tokenizer.
//!
//! Network reads hand us byte chunks with arbitrary split points. A `data:`
//! line can arrive in two halves, and so can a multi-byte UTF-8 character.
//! [`LineSplitter`] buffers raw bytes and only decodes lines once their
//! terminating `\n` has been seen.

/// In-band completion marker used by the chat backend.
pub const SENTINEL: &str = "[END]";

const DATA_PREFIX: &str = "data: ";
const EVENT_PREFIX: &str = "event:";

/// Splits a byte stream into logical lines, carrying the unterminated tail
/// of each chunk over to the next one.
#[derive(Debug, Default)]
pub struct LineSplitter {
    carry: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completes, in order.
    ///
    /// Line terminators (`\n`, with an optional preceding `\r`) are stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.carry[start..end]));
            start = end + 1;
        }
        self.carry.drain(..start);
        lines
    }

    /// Flush the trailing line left over when the stream ends without a
    /// final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let line = decode_line(&self.carry);
        self.carry.clear();
        Some(line)
    }

    /// Number of bytes waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// One classified SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `event: <name>`, name trimmed.
    Event(String),
    /// `data: <payload>`, payload is everything after the six-character
    /// prefix, untrimmed.
    Data(String),
    /// Empty line (record separator).
    Blank,
    /// `:` comment, used for keep-alives.
    Comment(String),
    /// Any other field (`id:`, `retry:`, garbage).
    Other(String),
}

impl SseLine {
    pub fn parse(line: &str) -> Self {
        if line.is_empty() {
            return Self::Blank;
        }
        if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            return Self::Data(payload.to_string());
        }
        if let Some(name) = line.strip_prefix(EVENT_PREFIX) {
            return Self::Event(name.trim().to_string());
        }
        if let Some(comment) = line.strip_prefix(':') {
            return Self::Comment(comment.trim_start().to_string());
        }
        Self::Other(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDED: &str = "event: start\n\
data: {\"chat_id\":1}\n\
\n\
event: message_created\n\
data: {\"message_id\":\"m-1\"}\n\
\n\
data: {\"type\":\"token\",\"content\":\"héllo wörld\"}\n\
\n\
event: done\r\n\
data: {\"content\":\"[END]\"}\n\
\n";

    fn single_read(input: &[u8]) -> Vec<String> {
        let mut splitter = LineSplitter::new();
        let mut lines = splitter.push(input);
        lines.extend(splitter.finish());
        lines
    }

    #[test]
    fn test_every_split_point_yields_same_lines() {
        let bytes = RECORDED.as_bytes();
        let expected = single_read(bytes);

        for split in 0..=bytes.len() {
            let mut splitter = LineSplitter::new();
            let mut lines = splitter.push(&bytes[..split]);
            lines.extend(splitter.push(&bytes[split..]));
            lines.extend(splitter.finish());
            assert_eq!(lines, expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_single_read() {
        let bytes = RECORDED.as_bytes();
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for b in bytes {
            lines.extend(splitter.push(std::slice::from_ref(b)));
        }
        lines.extend(splitter.finish());
        assert_eq!(lines, single_read(bytes));
    }

    #[test]
    fn test_partial_data_line_is_carried() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"data: {\"type\":\"tok").is_empty());
        assert_eq!(splitter.pending(), 18);

        let lines = splitter.push(b"en\",\"content\":\"Hi\"}\n");
        assert_eq!(lines, vec![r#"data: {"type":"token","content":"Hi"}"#]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"event: done\r\n\r\n");
        assert_eq!(lines, vec!["event: done".to_string(), String::new()]);
    }

    #[test]
    fn test_finish_flushes_unterminated_tail() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"data: [END]").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("data: [END]"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_parse_event_is_trimmed() {
        assert_eq!(
            SseLine::parse("event:   first_token  "),
            SseLine::Event("first_token".to_string())
        );
    }

    #[test]
    fn test_parse_data_keeps_payload_whitespace() {
        assert_eq!(
            SseLine::parse("data:  padded "),
            SseLine::Data(" padded ".to_string())
        );
    }

    #[test]
    fn test_parse_other_forms() {
        assert_eq!(SseLine::parse(""), SseLine::Blank);
        assert_eq!(
            SseLine::parse(": keep-alive"),
            SseLine::Comment("keep-alive".to_string())
        );
        assert_eq!(
            SseLine::parse("id: 7"),
            SseLine::Other("id: 7".to_string())
        );
        // Without the space the prefix is not the six-character data prefix.
        assert_eq!(
            SseLine::parse("data:x"),
            SseLine::Other("data:x".to_string())
        );
    }
}
