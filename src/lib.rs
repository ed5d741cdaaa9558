//! Marketplace Relay - Real-time payment notification relay
//!
//! Delivers payment outcome events to a logged-in user's browser over a
//! long-lived `text/event-stream` response, using a publish/subscribe bus
//! as the backbone:
//!
//! ```text
//! publisher ─► bus channel payment:<userId> ─► stream gateway ─► client relay ─► display
//! ```
//!
//! The client side reconnects with capped exponential backoff.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
