//! Client relay adapters.
//!
//! - `client` - Drives the reconnection state machine against a transport
//! - `decoder` - Incremental text/event-stream decoding
//! - `http` - reqwest transport for the gateway's stream endpoint

mod client;
mod decoder;
mod http;

pub use client::ClientRelay;
pub use decoder::EventStreamDecoder;
pub use http::HttpEventStreamTransport;
