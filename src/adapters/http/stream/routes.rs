//! Axum router configuration for stream endpoints.

use axum::{routing::get, Router};

use super::handlers::{open_payment_stream, StreamAppState};

/// Create the notification stream router.
///
/// # Routes
/// - `GET /stream` - Open the caller's payment event stream (requires authentication)
pub fn stream_routes() -> Router<StreamAppState> {
    Router::new().route("/stream", get(open_payment_stream))
}

/// Create the complete notification router, mounted at `/api/notifications`.
pub fn stream_router() -> Router<StreamAppState> {
    Router::new().nest("/api/notifications", stream_routes())
}
