//! Line decoder for chunked `data:` streams
//!
//! Transport chunks arrive with arbitrary boundaries: a boundary may fall in
//! the middle of a JSON token, a `data:` prefix, or a multi-byte UTF-8
//! character. The decoder holds back everything after the last `\n` it has
//! seen and only classifies lines that are known to be complete.

use crate::sse::events::{Frame, Sentinel};

/// Prefix that marks a payload line.
pub const DATA_PREFIX: &str = "data:";

/// Classify one complete line (without its trailing newline).
///
/// Returns `None` for blank lines, comments, other SSE fields and empty
/// `data:` lines.
pub fn classify_line(line: &str) -> Option<Frame> {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }

    match Sentinel::from_payload(payload) {
        Some(sentinel) => Some(Frame::Sentinel(sentinel)),
        None => Some(Frame::Payload(payload.to_string())),
    }
}

/// Stateful decoder turning raw chunks into complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Decoded text after the last seen newline
    buffer: String,
    /// Bytes of a UTF-8 sequence cut off by a chunk boundary
    pending_utf8: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw byte chunk and return every frame it completed.
    pub fn append_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.push_bytes(chunk);
        self.drain_complete_lines()
    }

    /// Append an already-decoded text chunk.
    pub fn append_text(&mut self, text: &str) -> Vec<Frame> {
        self.flush_pending_utf8();
        self.buffer.push_str(text);
        self.drain_complete_lines()
    }

    /// Flush at transport end-of-data.
    ///
    /// End-of-data is a line boundary, so an unterminated final line is
    /// classified like any other. A dangling partial UTF-8 sequence is
    /// replaced with U+FFFD.
    pub fn finish(&mut self) -> Vec<Frame> {
        self.flush_pending_utf8();
        let last = std::mem::take(&mut self.buffer);
        if last.is_empty() {
            return Vec::new();
        }
        tracing::debug!(len = last.len(), "Flushing unterminated final line");
        classify_line(&last).into_iter().collect()
    }

    /// Text held back waiting for its newline.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// True when nothing is held back.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending_utf8.is_empty()
    }

    /// Drop all buffered state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending_utf8.clear();
    }

    fn push_bytes(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // Sequence is cut short by the chunk boundary
                        None => {
                            self.pending_utf8 = after.to_vec();
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                    }
                }
            }
        }
    }

    fn flush_pending_utf8(&mut self) {
        if !self.pending_utf8.is_empty() {
            let pending = std::mem::take(&mut self.pending_utf8);
            self.buffer.push_str(&String::from_utf8_lossy(&pending));
        }
    }

    fn drain_complete_lines(&mut self) -> Vec<Frame> {
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete.lines().filter_map(classify_line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Frame {
        Frame::Payload(s.to_string())
    }

    #[test]
    fn test_classify_data_line() {
        assert_eq!(classify_line(r#"data: {"a":1}"#), Some(payload(r#"{"a":1}"#)));
        assert_eq!(classify_line(r#"data:{"a":1}"#), Some(payload(r#"{"a":1}"#)));
        assert_eq!(classify_line("data: {\"a\":1}\r"), Some(payload(r#"{"a":1}"#)));
    }

    #[test]
    fn test_classify_ignores_other_lines() {
        assert_eq!(classify_line(""), None);
        assert_eq!(classify_line(": keepalive"), None);
        assert_eq!(classify_line("event: progress"), None);
        assert_eq!(classify_line("data:"), None);
        assert_eq!(classify_line("data:    "), None);
    }

    #[test]
    fn test_classify_sentinels() {
        assert_eq!(classify_line("data: [DONE]"), Some(Frame::Sentinel(Sentinel::Done)));
        assert_eq!(
            classify_line("data: \"done\""),
            Some(Frame::Sentinel(Sentinel::QuotedDone))
        );
        assert_eq!(classify_line("data: null"), Some(Frame::Sentinel(Sentinel::Null)));
    }

    #[test]
    fn test_holds_back_partial_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.append_text("data: {\"type\":").is_empty());
        assert_eq!(decoder.remainder(), "data: {\"type\":");

        let frames = decoder.append_text("\"started\"}\n\n");
        assert_eq!(frames, vec![payload(r#"{"type":"started"}"#)]);
        assert_eq!(decoder.remainder(), "");
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.append_text("data: {\"a\":1}\n\ndata: {\"b\":2}\ndata: [DO");
        assert_eq!(frames, vec![payload(r#"{"a":1}"#), payload(r#"{"b":2}"#)]);
        assert_eq!(decoder.remainder(), "data: [DO");

        let frames = decoder.append_text("NE]\n");
        assert_eq!(frames, vec![Frame::Sentinel(Sentinel::Done)]);
    }

    #[test]
    fn test_every_split_offset_yields_same_frames() {
        let input = "data: {\"type\":\"text\",\"data\":{\"t\":\"a\\\"}b\"}}\n\n: ping\ndata: [DONE]\n";
        let mut whole = FrameDecoder::new();
        let expected = whole.append_chunk(input.as_bytes());
        assert_eq!(expected.len(), 2);

        for offset in 0..=input.len() {
            let (a, b) = input.as_bytes().split_at(offset);
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.append_chunk(a);
            frames.extend(decoder.append_chunk(b));
            assert_eq!(frames, expected, "split at {}", offset);
        }
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let input = "data: {\"text\":\"caf\u{e9} \u{1f600}\"}\n";
        let bytes = input.as_bytes();
        for offset in 0..=bytes.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.append_chunk(&bytes[..offset]);
            frames.extend(decoder.append_chunk(&bytes[offset..]));
            assert_eq!(
                frames,
                vec![payload("{\"text\":\"caf\u{e9} \u{1f600}\"}")],
                "split at {}",
                offset
            );
        }
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.append_chunk(b"data: {\"t\":\"\xff\"}\n");
        assert_eq!(frames, vec![payload("{\"t\":\"\u{fffd}\"}")]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.append_text("data: {\"a\":1}\r\n\r\ndata: [DONE]\r\n");
        assert_eq!(frames, vec![payload(r#"{"a":1}"#), Frame::Sentinel(Sentinel::Done)]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.append_text("data: {\"a\":1}").is_empty());
        assert_eq!(decoder.finish(), vec![payload(r#"{"a":1}"#)]);
        assert!(decoder.is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut decoder = FrameDecoder::new();
        decoder.append_chunk(b"data: {\"a\xc3");
        assert!(!decoder.is_empty());
        decoder.reset();
        assert!(decoder.is_empty());
    }
}
