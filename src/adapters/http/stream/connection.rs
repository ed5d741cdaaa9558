//! Per-request stream connection.
//!
//! A `StreamConnection` binds one authenticated caller, one dedicated bus
//! subscriber client, one heartbeat timer, and one outbound frame sequence.
//! They are created together and released together:
//!
//! ```text
//! Init ─authenticate─► Authenticating ─subscribe─► Subscribed ─start_streaming─► Streaming
//!                            │                         │                            │
//!                            └── no caller ────────────┴──── close / drop ──────────┴──► Closed
//! ```
//!
//! The auth middleware verifies tokens; `authenticate` decides whether the
//! request carries a resolved caller at all. A request without one is
//! closed before any bus resource is acquired.
//!
//! Teardown cancels the heartbeat, unsubscribes, then closes the broker
//! client. Each step is attempted even if the previous one failed. When the
//! connection is dropped without `close` (peer aborted the response), the
//! same teardown is spawned onto the runtime.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adapters::http::middleware::AuthRejection;
use crate::domain::foundation::{AuthenticatedUser, ConnectionId, StateMachine, UserId};
use crate::domain::notification::{Channel, ConnectionState, Frame, PaymentEvent};
use crate::ports::{BrokerClient, BrokerClientFactory, BrokerError, DeliveryReceiver};

/// The resolved caller and the channel derived from it.
struct Caller {
    user_id: UserId,
    channel: Channel,
}

/// One open event stream for one caller.
pub struct StreamConnection {
    id: ConnectionId,
    caller: Option<Caller>,
    state: ConnectionState,
    broker: Option<Box<dyn BrokerClient>>,
    deliveries: Option<DeliveryReceiver>,
    heartbeat: Option<Interval>,
    shutdown: CancellationToken,
}

impl StreamConnection {
    /// Accepts a request. `shutdown` ends the stream when cancelled.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            caller: None,
            state: ConnectionState::Init,
            broker: None,
            deliveries: None,
            heartbeat: None,
            shutdown,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The caller's channel, once authenticated.
    pub fn channel(&self) -> Option<&Channel> {
        self.caller.as_ref().map(|caller| &caller.channel)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Binds the connection to the caller resolved for this request.
    ///
    /// Without a caller the connection closes immediately and nothing is
    /// allocated; the rejection renders as 401.
    pub fn authenticate(&mut self, identity: Option<&AuthenticatedUser>) -> Result<(), AuthRejection> {
        if self.state != ConnectionState::Init {
            return Err(AuthRejection::Unauthenticated);
        }
        self.enter(ConnectionState::Authenticating);

        match identity {
            Some(user) => {
                self.caller = Some(Caller {
                    user_id: user.id.clone(),
                    channel: Channel::for_recipient(&user.id),
                });
                tracing::debug!(connection_id = %self.id, user_id = %user.id, "stream requested");
                Ok(())
            }
            None => {
                self.enter(ConnectionState::Closed);
                tracing::debug!(connection_id = %self.id, "stream rejected: no authenticated caller");
                Err(AuthRejection::Unauthenticated)
            }
        }
    }

    /// Acquires a dedicated broker client and subscribes to the caller's
    /// channel. On failure the client is released and the connection is
    /// closed.
    pub async fn subscribe(&mut self, brokers: &dyn BrokerClientFactory) -> Result<(), BrokerError> {
        if self.state != ConnectionState::Authenticating {
            return Err(BrokerError::Closed);
        }
        let Some(channel) = self.channel().cloned() else {
            return Err(BrokerError::Closed);
        };

        let mut broker = brokers.create();
        let result = broker.subscribe(&channel).await;
        self.broker = Some(broker);

        match result {
            Ok(deliveries) => {
                self.deliveries = Some(deliveries);
                self.enter(ConnectionState::Subscribed);
                tracing::debug!(connection_id = %self.id, channel = %channel, "subscribed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id,
                    channel = %channel,
                    error = %e,
                    "subscribe failed, closing stream"
                );
                self.close().await;
                Err(e)
            }
        }
    }

    /// Starts the heartbeat and returns the `connected` frame that must be
    /// written first.
    pub fn start_streaming(&mut self, heartbeat_period: Duration) -> Option<Frame> {
        if self.state != ConnectionState::Subscribed {
            return None;
        }
        let frame = match Frame::event(&PaymentEvent::Connected) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(connection_id = %self.id, error = %e, "cannot encode connected frame");
                return None;
            }
        };

        let mut heartbeat = time::interval_at(Instant::now() + heartbeat_period, heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(heartbeat);
        self.enter(ConnectionState::Streaming);

        tracing::info!(
            connection_id = %self.id,
            user_id = self.caller.as_ref().map(|caller| caller.user_id.as_str()),
            channel = self.channel().map(Channel::as_str),
            "stream open"
        );
        Some(frame)
    }

    /// Waits for the next frame to write.
    ///
    /// Returns `None` once the stream is over: shutdown was requested, or
    /// the subscription errored or ended. The connection is closed before
    /// `None` is returned.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        if self.state != ConnectionState::Streaming {
            return None;
        }

        let frame = match (self.deliveries.as_mut(), self.heartbeat.as_mut()) {
            (Some(deliveries), Some(heartbeat)) => {
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        tracing::debug!(connection_id = %self.id, "shutdown requested");
                        None
                    }
                    delivery = deliveries.recv() => match delivery {
                        Some(Ok(payload)) => Some(Frame::Data(payload)),
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %self.id, error = %e, "bus delivery failed");
                            None
                        }
                        None => {
                            tracing::warn!(connection_id = %self.id, "bus delivery ended");
                            None
                        }
                    },
                    _ = heartbeat.tick() => Some(Frame::Heartbeat),
                }
            }
            _ => None,
        };

        if frame.is_none() {
            self.close().await;
        }
        frame
    }

    /// Tears the connection down. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.enter(ConnectionState::Closed);
        self.heartbeat = None;

        if let (Some(broker), Some(channel)) = (self.broker.take(), self.channel().cloned()) {
            release(self.id, channel, broker).await;
        }
        self.deliveries = None;
        tracing::info!(
            connection_id = %self.id,
            channel = self.channel().map(Channel::as_str),
            "stream closed"
        );
    }

    fn enter(&mut self, next: ConnectionState) {
        match self.state.transition_to(next) {
            Ok(state) => self.state = state,
            Err(e) => tracing::error!(
                connection_id = %self.id,
                from = %self.state,
                to = %next,
                error = %e,
                "rejected connection transition"
            ),
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.heartbeat = None;
        self.deliveries = None;

        let (Some(broker), Some(channel)) = (self.broker.take(), self.channel().cloned()) else {
            return;
        };
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::info!(connection_id = %id, channel = %channel, "stream aborted by peer");
                handle.spawn(release(id, channel, broker));
            }
            // Without a runtime the broker client's own Drop releases the connection.
            Err(_) => drop(broker),
        }
    }
}

/// Unsubscribes and closes a broker client. Failures are logged, never raised.
async fn release(id: ConnectionId, channel: Channel, mut broker: Box<dyn BrokerClient>) {
    if let Err(e) = broker.unsubscribe(&channel).await {
        tracing::warn!(connection_id = %id, channel = %channel, error = %e, "unsubscribe failed");
    }
    if let Err(e) = broker.close().await {
        tracing::warn!(connection_id = %id, channel = %channel, error = %e, "broker close failed");
    }
}
