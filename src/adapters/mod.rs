//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay to external systems:
//! - `auth` - Session token validation
//! - `broker` - Message bus clients (Redis, in-memory)
//! - `http` - Stream gateway endpoint and middleware
//! - `relay` - Client-side stream consumer with reconnection

pub mod auth;
pub mod broker;
pub mod http;
pub mod relay;
