//! Client-side event stream transport port.
//!
//! The client relay opens streams through this port so the reconnection
//! logic can be driven by a real HTTP connection or a scripted one in tests.
//! Dropping the returned stream closes the handle.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Raw bytes of an open event stream.
pub type EventByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Transport-level failures. All of them drive a reconnect.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("Failed to open event stream: {0}")]
    Connect(String),

    /// The gateway answered with a non-success status.
    #[error("Event stream rejected with status {0}")]
    Status(u16),

    /// The connection failed while reading.
    #[error("Event stream read failed: {0}")]
    Read(String),
}

/// Opens streaming connections to the gateway.
#[async_trait]
pub trait EventStreamTransport: Send + Sync {
    async fn open(&self) -> Result<EventByteStream, TransportError>;
}
