//! HTTP handlers for the payment event stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::adapters::http::middleware::RequireAuth;
use crate::ports::BrokerClientFactory;

use super::connection::StreamConnection;

/// Shared state for stream endpoints.
///
/// Nothing in here is per-connection: each request builds its own
/// `StreamConnection` and owns it exclusively.
#[derive(Clone)]
pub struct StreamAppState {
    /// Source of dedicated subscriber clients.
    pub brokers: Arc<dyn BrokerClientFactory>,
    /// Period between heartbeat frames.
    pub heartbeat_interval: Duration,
    /// Cancelled when the process shuts down.
    pub shutdown: CancellationToken,
}

impl StreamAppState {
    pub fn new(
        brokers: Arc<dyn BrokerClientFactory>,
        heartbeat_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            brokers,
            heartbeat_interval,
            shutdown,
        }
    }
}

/// GET /api/notifications/stream - Open the caller's payment event stream
///
/// Rejected with 401 before anything is allocated when the caller has no
/// resolvable identity. Otherwise answers 200 with a `text/event-stream`
/// body whose first frame is `connected`. The body ends without further
/// frames if the subscription cannot be established or later fails; the
/// client reconnects.
pub async fn open_payment_stream(
    State(state): State<StreamAppState>,
    identity: Option<RequireAuth>,
) -> Response {
    let mut connection = StreamConnection::new(state.shutdown.child_token());
    let user = identity.map(|RequireAuth(user)| user);
    if let Err(rejection) = connection.authenticate(user.as_ref()) {
        return rejection.into_response();
    }

    let brokers = state.brokers;
    let heartbeat_interval = state.heartbeat_interval;
    let frames = async_stream::stream! {
        if connection.subscribe(brokers.as_ref()).await.is_err() {
            return;
        }
        let Some(connected) = connection.start_streaming(heartbeat_interval) else {
            connection.close().await;
            return;
        };
        yield Ok::<Bytes, Infallible>(connected.encode());

        while let Some(frame) = connection.next_frame().await {
            yield Ok(frame.encode());
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// GET /health - Liveness check
pub async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
