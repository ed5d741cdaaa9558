//! Message bus ports.
//!
//! The bus is a channel-oriented publish/subscribe system with no
//! persistence and no replay: a listener that is not subscribed when a
//! message is published never sees it.
//!
//! Two kinds of clients exist, matching how bus connections behave:
//!
//! - `BrokerClient` - a dedicated subscriber connection, one per open
//!   stream. A connection in subscriber mode cannot issue other commands,
//!   so it is never shared.
//! - `ChannelPublisher` - a single process-wide connection used only for
//!   publishing. Publishes carry no connection affinity, so it is shared by
//!   every caller.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::notification::Channel;

/// One item delivered by a subscription: a raw message payload, or the
/// error that ended delivery.
pub type Delivery = Result<String, BrokerError>;

/// Receiving side of a subscription. Yields payloads in the order the bus
/// delivered them; closes when delivery stops.
pub type DeliveryReceiver = mpsc::Receiver<Delivery>;

/// Errors raised by bus clients.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The bus connection could not be established.
    #[error("Bus connection failed: {0}")]
    Connect(String),

    /// The bus rejected the subscribe request.
    #[error("Subscribe to {channel} rejected: {reason}")]
    Subscribe { channel: String, reason: String },

    /// The bus rejected the unsubscribe request.
    #[error("Unsubscribe from {channel} failed: {reason}")]
    Unsubscribe { channel: String, reason: String },

    /// Publishing failed.
    #[error("Publish to {channel} failed: {reason}")]
    Publish { channel: String, reason: String },

    /// The subscription dropped after being established.
    #[error("Bus connection lost: {0}")]
    ConnectionLost(String),

    /// This client already holds a subscription.
    #[error("Client already subscribed to {0}")]
    AlreadySubscribed(String),

    /// The client was closed.
    #[error("Broker client closed")]
    Closed,
}

/// Dedicated subscriber connection owned by a single stream.
///
/// # Contract
///
/// - `subscribe` connects lazily and fails with `Connect` or `Subscribe`.
/// - `unsubscribe` is idempotent; an unknown or already-released channel
///   is not an error.
/// - `close` releases the connection and is idempotent.
/// - Dropping the client releases the connection even if `close` was never
///   awaited.
#[async_trait]
pub trait BrokerClient: Send {
    /// Subscribe to `channel`; messages arrive on the returned receiver.
    async fn subscribe(&mut self, channel: &Channel) -> Result<DeliveryReceiver, BrokerError>;

    /// Stop receiving messages from `channel`.
    async fn unsubscribe(&mut self, channel: &Channel) -> Result<(), BrokerError>;

    /// Release the dedicated bus connection.
    async fn close(&mut self) -> Result<(), BrokerError>;
}

/// Creates dedicated subscriber clients.
///
/// Creation is cheap and infallible; the connection is made by
/// `BrokerClient::subscribe`.
pub trait BrokerClientFactory: Send + Sync {
    fn create(&self) -> Box<dyn BrokerClient>;
}

/// Process-wide publishing client.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Publish `payload` to `channel`. Returns how many subscribers the bus
    /// reported receiving it; no delivery confirmation is awaited.
    async fn publish(&self, channel: &Channel, payload: &str) -> Result<usize, BrokerError>;
}
