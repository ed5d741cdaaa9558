//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay and the outside world. Adapters implement these ports.
//!
//! ## Bus Ports
//!
//! - `BrokerClient` - Dedicated per-stream subscriber connection
//! - `BrokerClientFactory` - Creates subscriber clients
//! - `ChannelPublisher` - Process-wide publishing client
//!
//! ## Identity Ports
//!
//! - `SessionValidator` - Resolves a session token to a user
//!
//! ## Client Ports
//!
//! - `EventStreamTransport` - Opens streaming connections to the gateway

mod broker;
mod event_stream;
mod session_validator;

pub use broker::{
    BrokerClient, BrokerClientFactory, BrokerError, ChannelPublisher, Delivery, DeliveryReceiver,
};
pub use event_stream::{EventByteStream, EventStreamTransport, TransportError};
pub use session_validator::SessionValidator;
