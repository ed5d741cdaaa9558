//! Incremental `text/event-stream` decoder.
//!
//! Only the parts of the format the relay needs are interpreted:
//!
//! - lines end with `\n`; a trailing `\r` is ignored
//! - `data:` lines accumulate, joined with `\n`; one leading space is dropped
//! - lines starting with `:` are comments (heartbeats) and are skipped
//! - other fields (`event:`, `id:`, `retry:`) are ignored
//! - a blank line dispatches the accumulated data, if any
//!
//! Chunks may split lines, or UTF-8 sequences, anywhere. A line longer than
//! [`MAX_LINE_BYTES`] fails the stream.

use crate::ports::TransportError;

/// Longest line accepted from the gateway, terminator excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Buffers raw bytes and yields complete `data` payloads.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every payload it completed, in order.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Read` when a line exceeds `MAX_LINE_BYTES`.
    /// The decoder is reset and the stream should be abandoned.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, TransportError> {
        self.pending.extend_from_slice(chunk);

        let mut dispatched = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if offset > MAX_LINE_BYTES + 1 {
                return Err(self.overflow());
            }
            let raw = &self.pending[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            start = end + 1;

            if let Some(payload) = self.process_line(&line) {
                dispatched.push(payload);
            }
        }
        self.pending.drain(..start);
        if self.pending.len() > MAX_LINE_BYTES + 1 {
            return Err(self.overflow());
        }
        Ok(dispatched)
    }

    fn overflow(&mut self) -> TransportError {
        self.pending.clear();
        self.data.clear();
        TransportError::Read(format!("event stream line exceeds {} bytes", MAX_LINE_BYTES))
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::{Frame, PaymentEvent};
    use proptest::prelude::*;

    #[test]
    fn decodes_single_data_frame() {
        let mut decoder = EventStreamDecoder::new();
        let out = decoder.push(b"data: {\"type\":\"connected\"}\n\n").unwrap();
        assert_eq!(out, vec![r#"{"type":"connected"}"#.to_string()]);
    }

    #[test]
    fn skips_heartbeat_comments() {
        let mut decoder = EventStreamDecoder::new();
        let out = decoder.push(b": heartbeat\n\n: heartbeat\n\ndata: x\n\n").unwrap();
        assert_eq!(out, vec!["x".to_string()]);
    }

    #[test]
    fn buffers_partial_chunks() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.push(b"da").unwrap().is_empty());
        assert!(decoder.push(b"ta: hel").unwrap().is_empty());
        assert!(decoder.push(b"lo\n").unwrap().is_empty());
        assert_eq!(decoder.push(b"\n").unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let mut decoder = EventStreamDecoder::new();
        let out = decoder.push(b"data: a\r\n\r\n").unwrap();
        assert_eq!(out, vec!["a".to_string()]);
    }

    #[test]
    fn joins_multiple_data_lines() {
        let mut decoder = EventStreamDecoder::new();
        let out = decoder.push(b"data: first\ndata:second\n\n").unwrap();
        assert_eq!(out, vec!["first\nsecond".to_string()]);
    }

    #[test]
    fn ignores_other_fields() {
        let mut decoder = EventStreamDecoder::new();
        let out = decoder.push(b"event: payment\nid: 7\nretry: 100\ndata: x\n\n").unwrap();
        assert_eq!(out, vec!["x".to_string()]);
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.push(b"\n\nevent: x\n\n").unwrap().is_empty());
    }

    #[test]
    fn multibyte_characters_survive_split_chunks() {
        let bytes = "data: Café ☕\n\n".as_bytes();
        let mut decoder = EventStreamDecoder::new();
        let mut out = Vec::new();
        for byte in bytes {
            out.extend(decoder.push(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(out, vec!["Café ☕".to_string()]);
    }

    #[test]
    fn unterminated_line_past_the_limit_fails() {
        let mut decoder = EventStreamDecoder::new();
        let mut chunk = b"data: ".to_vec();
        chunk.resize(MAX_LINE_BYTES + 2, b'x');

        let err = decoder.push(&chunk).unwrap_err();
        assert!(matches!(err, TransportError::Read(_)));

        // Nothing from the rejected line leaks into the next frame.
        assert_eq!(decoder.push(b"\ndata: y\n\n").unwrap(), vec!["y".to_string()]);
    }

    #[test]
    fn complete_line_past_the_limit_fails() {
        let mut decoder = EventStreamDecoder::new();
        let mut chunk = b"data: ".to_vec();
        chunk.resize(MAX_LINE_BYTES + 2, b'x');
        chunk.extend_from_slice(b"\n\n");

        assert!(decoder.push(&chunk).is_err());
    }

    #[test]
    fn line_at_the_limit_is_accepted() {
        let mut decoder = EventStreamDecoder::new();
        let mut chunk = b"data: ".to_vec();
        chunk.resize(MAX_LINE_BYTES, b'x');
        chunk.extend_from_slice(b"\n\n");

        let out = decoder.push(&chunk).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), MAX_LINE_BYTES - "data: ".len());
    }

    fn arb_event() -> impl Strategy<Value = PaymentEvent> {
        let text = "\\PC{0,24}";
        prop_oneof![
            Just(PaymentEvent::Connected),
            (text, proptest::option::of(text)).prop_map(|(product_id, product_title)| {
                PaymentEvent::PaymentSuccess {
                    product_id,
                    product_title,
                }
            }),
            (
                proptest::option::of(text),
                proptest::option::of(text),
                text
            )
                .prop_map(|(product_id, product_title, message)| {
                    PaymentEvent::PaymentFailed {
                        product_id,
                        product_title,
                        message,
                    }
                }),
        ]
    }

    proptest! {
        #[test]
        fn encoded_frames_decode_to_the_same_event(event in arb_event(), split in 1usize..16) {
            let bytes = Frame::event(&event).unwrap().encode();
            let mut decoder = EventStreamDecoder::new();
            let mut out = Vec::new();
            for chunk in bytes.chunks(split) {
                out.extend(decoder.push(chunk).unwrap());
            }
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(PaymentEvent::from_json(&out[0]).unwrap(), event);
        }
    }
}
