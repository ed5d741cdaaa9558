//! Lifecycle of one server-side event stream connection.

use std::fmt;

use crate::domain::foundation::StateMachine;

/// State of a stream gateway connection.
///
/// `Init → Authenticating → Subscribed → Streaming → Closed`. Every
/// non-terminal state may fall through to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Request accepted.
    #[default]
    Init,
    /// Resolving caller identity.
    Authenticating,
    /// Dedicated broker client acquired, subscription requested.
    Subscribed,
    /// Relaying bus messages and heartbeats.
    Streaming,
    /// Heartbeat cancelled, broker client unsubscribed and closed.
    Closed,
}

impl ConnectionState {
    /// True while a dedicated broker client may be held.
    pub fn holds_broker(&self) -> bool {
        matches!(self, ConnectionState::Subscribed | ConnectionState::Streaming)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Init, Authenticating)
                | (Authenticating, Subscribed)
                | (Subscribed, Streaming)
                | (Init | Authenticating | Subscribed | Streaming, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Init => vec![Authenticating, Closed],
            Authenticating => vec![Subscribed, Closed],
            Subscribed => vec![Streaming, Closed],
            Streaming => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Init => "init",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
