//! HTTP adapters.
//!
//! - `middleware` - Session authentication
//! - `stream` - Payment event stream endpoint

pub mod middleware;
pub mod stream;

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use middleware::{auth_middleware, AuthState, RequireAuth};
pub use stream::{stream_router, StreamAppState};

/// Build the relay's HTTP application.
///
/// Stream routes sit behind the auth middleware; `/health` does not.
/// `cors_origins` lists browser origins allowed to open streams with
/// credentials; an empty list disables CORS handling.
pub fn app_router(stream_state: StreamAppState, auth: AuthState, cors_origins: &[String]) -> Router {
    let streams = stream_router()
        .with_state(stream_state)
        .layer(from_fn_with_state(auth, auth_middleware));

    let app = Router::new()
        .route("/health", get(stream::health))
        .merge(streams)
        .layer(TraceLayer::new_for_http());

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return app;
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET])
            .allow_credentials(true),
    )
}
