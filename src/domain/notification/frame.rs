//! Outbound text/event-stream frames.

use bytes::Bytes;

use super::PaymentEvent;

/// Comment frame emitted to keep idle intermediaries from closing the stream.
pub const HEARTBEAT_FRAME: &str = ": heartbeat\n\n";

/// One unit written to the outbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A `data:` frame carrying a JSON payload. Bus payloads are normally
    /// single-line JSON; any line breaks are re-framed by [`Frame::encode`].
    Data(String),
    /// A comment frame with no payload.
    Heartbeat,
}

impl Frame {
    /// Data frame for a locally synthesized event.
    pub fn event(event: &PaymentEvent) -> Result<Self, serde_json::Error> {
        Ok(Frame::Data(event.to_json()?))
    }

    /// Encodes the frame in the text/event-stream wire format.
    ///
    /// A payload containing line breaks is split over several `data:` lines,
    /// which the client joins back with `\n`. `\r\n`, a lone `\r` and `\n`
    /// each count as one break, so no raw `\r` ever reaches the wire.
    pub fn encode(&self) -> Bytes {
        match self {
            Frame::Heartbeat => Bytes::from_static(HEARTBEAT_FRAME.as_bytes()),
            Frame::Data(payload) => {
                let mut out = String::with_capacity(payload.len() + 8);
                let normalized = payload.replace("\r\n", "\n");
                for line in normalized.split(|c: char| c == '\n' || c == '\r') {
                    out.push_str("data: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                Bytes::from(out)
            }
        }
    }
}
