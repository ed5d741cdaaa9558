//! HTTP adapter for the payment event stream.
//!
//! Turns one bus subscription into one `text/event-stream` response:
//! - `GET /api/notifications/stream` - Stream payment events for the caller

mod connection;
pub mod handlers;
pub mod routes;

pub use connection::StreamConnection;
pub use handlers::{health, open_payment_stream, StreamAppState};
pub use routes::stream_router;
