//! Foundation module - Shared domain primitives.
//!
//! Identifiers, authentication types, the state machine trait and
//! validation errors used across the relay.

mod auth;
mod errors;
mod ids;
mod state_machine;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::ValidationError;
pub use ids::{ConnectionId, UserId};
pub use state_machine::StateMachine;
