//! Domain layer containing the relay's types and state machines.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, errors, auth types, state machine trait)
//! - `notification` - Channels, payment events, wire frames, connection and relay lifecycles

pub mod foundation;
pub mod notification;
