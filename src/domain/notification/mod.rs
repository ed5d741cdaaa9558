//! Notification module - payment event relay vocabulary.
//!
//! - `Channel` - per-recipient bus topic naming
//! - `PaymentEvent` - the closed set of events on the wire
//! - `Frame` - text/event-stream encoding
//! - `ConnectionState` - server-side stream lifecycle
//! - `RelaySession` - client-side reconnection state machine
//! - `ReconnectBackoff` - capped exponential retry delays

mod backoff;
mod channel;
mod connection_state;
mod event;
mod frame;
mod relay_session;

pub use backoff::ReconnectBackoff;
pub use channel::{Channel, PAYMENT_CHANNEL_PREFIX};
pub use connection_state::ConnectionState;
pub use event::PaymentEvent;
pub use frame::{Frame, HEARTBEAT_FRAME};
pub use relay_session::{RelayCommand, RelaySession, RelayState};
