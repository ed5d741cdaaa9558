//! Client-side reconnection state machine.
//!
//! `RelaySession` holds no I/O. Each input (activation, frame, transport
//! error, retry timer, teardown) updates the state and returns the
//! commands the driver must execute, in order. The driver owns the actual
//! stream handle and timer.
//!
//! ```text
//! Idle ─activate─► Connecting ─"connected"─► Connected
//!                      ▲  │                      │
//!                retry │  └──transport error──┐  │ transport error
//!                      │                      ▼  ▼
//!                      └──────────────── ReconnectWait
//!
//! any state ─teardown─► TornDown
//! ```

use std::fmt;
use std::time::Duration;

use crate::domain::foundation::StateMachine;

use super::{PaymentEvent, ReconnectBackoff};

/// State of a client relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RelayState {
    #[default]
    Idle,
    /// A stream handle is open, subscription not yet confirmed.
    Connecting,
    /// The gateway confirmed the subscription with a `connected` frame.
    Connected,
    /// Waiting for the retry timer after a transport error.
    ReconnectWait,
    /// The owning context is gone. No further attempts.
    TornDown,
}

impl StateMachine for RelayState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RelayState::*;
        matches!(
            (self, target),
            (Idle | Connecting | Connected | ReconnectWait, Connecting)
                | (Connecting, Connected)
                | (Connecting | Connected, ReconnectWait)
                | (Idle | Connecting | Connected | ReconnectWait, TornDown)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RelayState::*;
        match self {
            Idle => vec![Connecting, TornDown],
            Connecting => vec![Connecting, Connected, ReconnectWait, TornDown],
            Connected => vec![Connecting, ReconnectWait, TornDown],
            ReconnectWait => vec![Connecting, TornDown],
            TornDown => vec![],
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayState::Idle => "idle",
            RelayState::Connecting => "connecting",
            RelayState::Connected => "connected",
            RelayState::ReconnectWait => "reconnect_wait",
            RelayState::TornDown => "torn_down",
        };
        f.write_str(s)
    }
}

/// Side effect requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    /// Open a new stream handle to the gateway.
    OpenStream,
    /// Close the current stream handle.
    CloseStream,
    /// Arm the single retry timer.
    ScheduleRetry(Duration),
    /// Disarm the retry timer.
    CancelRetry,
    /// Hand an event to the display callback.
    Deliver(PaymentEvent),
}

/// Reconnect bookkeeping for one client relay.
#[derive(Debug, Clone)]
pub struct RelaySession {
    state: RelayState,
    retry_count: u32,
    backoff: ReconnectBackoff,
    stream_open: bool,
    retry_pending: bool,
}

impl RelaySession {
    pub fn new(backoff: ReconnectBackoff) -> Self {
        Self {
            state: RelayState::Idle,
            retry_count: 0,
            backoff,
            stream_open: false,
            retry_pending: false,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True while a stream handle is held.
    pub fn has_open_stream(&self) -> bool {
        self.stream_open
    }

    /// Opens a fresh stream, closing any handle still held.
    pub fn activate(&mut self) -> Vec<RelayCommand> {
        if self.state == RelayState::TornDown {
            return Vec::new();
        }
        let mut commands = Vec::with_capacity(3);
        if self.retry_pending {
            self.retry_pending = false;
            commands.push(RelayCommand::CancelRetry);
        }
        if self.stream_open {
            commands.push(RelayCommand::CloseStream);
        }
        commands.push(RelayCommand::OpenStream);
        self.stream_open = true;
        self.enter(RelayState::Connecting);
        commands
    }

    /// Handles the payload of one `data:` frame from the current stream.
    ///
    /// Frames that fail to parse are dropped without changing state.
    pub fn on_frame(&mut self, data: &str) -> Vec<RelayCommand> {
        if !matches!(self.state, RelayState::Connecting | RelayState::Connected) {
            return Vec::new();
        }
        let event = match PaymentEvent::from_json(data) {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(error = %error, "discarding malformed frame");
                return Vec::new();
            }
        };
        match event {
            PaymentEvent::Connected => {
                self.retry_count = 0;
                if self.state == RelayState::Connecting {
                    self.enter(RelayState::Connected);
                }
                Vec::new()
            }
            event => vec![RelayCommand::Deliver(event)],
        }
    }

    /// Handles a dropped, refused or ended stream.
    pub fn on_transport_error(&mut self) -> Vec<RelayCommand> {
        if !matches!(self.state, RelayState::Connecting | RelayState::Connected) {
            return Vec::new();
        }
        let mut commands = Vec::with_capacity(2);
        if self.stream_open {
            self.stream_open = false;
            commands.push(RelayCommand::CloseStream);
        }
        let delay = self.backoff.delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.retry_pending = true;
        self.enter(RelayState::ReconnectWait);
        commands.push(RelayCommand::ScheduleRetry(delay));
        commands
    }

    /// Handles the retry timer firing.
    pub fn on_retry_elapsed(&mut self) -> Vec<RelayCommand> {
        if self.state != RelayState::ReconnectWait {
            return Vec::new();
        }
        self.retry_pending = false;
        self.activate()
    }

    /// Stops the session for good.
    pub fn teardown(&mut self) -> Vec<RelayCommand> {
        if self.state == RelayState::TornDown {
            return Vec::new();
        }
        let mut commands = Vec::with_capacity(2);
        if self.stream_open {
            self.stream_open = false;
            commands.push(RelayCommand::CloseStream);
        }
        if self.retry_pending {
            self.retry_pending = false;
            commands.push(RelayCommand::CancelRetry);
        }
        self.enter(RelayState::TornDown);
        commands
    }

    fn enter(&mut self, next: RelayState) {
        match self.state.transition_to(next) {
            Ok(state) => self.state = state,
            Err(error) => tracing::warn!(error = %error, "relay state transition rejected"),
        }
    }
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new(ReconnectBackoff::default())
    }
}
