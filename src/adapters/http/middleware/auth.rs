//! Authentication middleware and extractors for axum.
//!
//! This module provides:
//! - `auth_middleware` - Layer that validates the session token and injects the user into extensions
//! - `RequireAuth` - Extractor that requires authentication
//!
//! # Architecture
//!
//! The middleware uses the `SessionValidator` port, keeping it provider-agnostic.
//! Whether using signed session JWTs or a mock for testing, the middleware doesn't change.
//!
//! ```text
//! Request → auth_middleware → injects AuthenticatedUser into extensions
//!                                      ↓
//!                              Handler → RequireAuth extractor reads from extensions
//! ```
//!
//! # Token Sources
//!
//! Browsers cannot set headers on an `EventSource`, so the session cookie is
//! accepted alongside the `Authorization` header. The header wins when both
//! are present.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::{AuthError, AuthenticatedUser};
use crate::ports::SessionValidator;

/// Auth middleware state.
#[derive(Clone)]
pub struct AuthState {
    /// Validates the extracted token.
    pub validator: Arc<dyn SessionValidator>,
    /// Name of the cookie carrying the session token.
    pub session_cookie: Arc<str>,
}

impl AuthState {
    pub fn new(validator: Arc<dyn SessionValidator>, session_cookie: impl Into<Arc<str>>) -> Self {
        Self {
            validator,
            session_cookie: session_cookie.into(),
        }
    }
}

/// Extract the session token from a request's headers.
///
/// Checks, in order:
/// 1. `Authorization: Bearer <token>` header
/// 2. `<session_cookie>=<token>` cookie
pub fn extract_token(headers: &HeaderMap, session_cookie: &str) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == session_cookie && !value.is_empty()).then(|| value.to_string())
        })
}

/// Authentication middleware.
///
/// This middleware:
/// 1. Extracts the token from the Authorization header or session cookie
/// 2. Validates the token using the `SessionValidator` port
/// 3. On success, injects `AuthenticatedUser` into request extensions
/// 4. On missing token, continues without injecting (handlers decide)
/// 5. On invalid token, returns 401 Unauthorized
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers(), &auth.session_cookie) else {
        return next.run(request).await;
    };

    match auth.validator.validate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            let (status, message) = match &e {
                AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
                AuthError::ServiceUnavailable(msg) => {
                    tracing::error!("Auth service unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "Authentication service unavailable",
                    )
                }
            };

            (
                status,
                Json(serde_json::json!({
                    "error": message,
                    "code": "AUTH_ERROR"
                })),
            )
                .into_response()
        }
    }
}

/// Extractor that requires authentication.
///
/// If no user is in the request extensions (i.e., auth middleware didn't
/// successfully validate a token), returns 401 Unauthorized.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .cloned()
                .map(RequireAuth)
                .ok_or(AuthRejection::Unauthenticated)
        })
    }
}

/// Rejection type for authentication failures.
#[derive(Debug, Clone)]
pub enum AuthRejection {
    /// No valid authentication token was provided.
    Unauthenticated,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthRejection::Unauthenticated => (StatusCode::UNAUTHORIZED, "Authentication required"),
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "code": "UNAUTHENTICATED"
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::MockSessionValidator;
    use axum::{body::Body, middleware, routing::get, Router};
    use axum::http::{HeaderValue, Request as HttpRequest};
    use tower::ServiceExt;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    async fn whoami(RequireAuth(user): RequireAuth) -> String {
        user.id.to_string()
    }

    fn app(validator: MockSessionValidator) -> Router {
        let state = AuthState::new(Arc::new(validator), "session");
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn status_of(app: Router, request: HttpRequest<Body>) -> StatusCode {
        app.oneshot(request).await.unwrap().status()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Token Extraction Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn extracts_bearer_token() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer my-token")]);
        assert_eq!(extract_token(&map, "session").as_deref(), Some("my-token"));
    }

    #[test]
    fn ignores_other_authorization_schemes() {
        let map = headers(&[(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_token(&map, "session"), None);
    }

    #[test]
    fn extracts_named_session_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; session=abc123; lang=en")]);
        assert_eq!(extract_token(&map, "session").as_deref(), Some("abc123"));
    }

    #[test]
    fn cookie_name_must_match_exactly() {
        let map = headers(&[(header::COOKIE, "session_old=stale; xsession=nope")]);
        assert_eq!(extract_token(&map, "session"), None);
    }

    #[test]
    fn header_wins_over_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer from-header"),
            (header::COOKIE, "session=from-cookie"),
        ]);
        assert_eq!(extract_token(&map, "session").as_deref(), Some("from-header"));
    }

    #[test]
    fn empty_values_are_not_tokens() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer "),
            (header::COOKIE, "session="),
        ]);
        assert_eq!(extract_token(&map, "session"), None);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Middleware Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let app = app(MockSessionValidator::new().with_test_user("good", "U1"));
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Bearer good")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"U1");
    }

    #[tokio::test]
    async fn valid_cookie_reaches_handler() {
        let app = app(MockSessionValidator::new().with_test_user("good", "U1"));
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(header::COOKIE, "session=good")
            .body(Body::empty())
            .unwrap();

        assert_eq!(status_of(app, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_rejected_by_extractor() {
        let app = app(MockSessionValidator::new());
        let request = HttpRequest::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();

        assert_eq!(status_of(app, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_by_middleware() {
        let app = app(MockSessionValidator::new());
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Bearer forged")
            .body(Body::empty())
            .unwrap();

        assert_eq!(status_of(app, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validator_outage_is_503() {
        let app = app(MockSessionValidator::new().with_error(AuthError::service_unavailable("down")));
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(header::AUTHORIZATION, "Bearer anything")
            .body(Body::empty())
            .unwrap();

        assert_eq!(status_of(app, request).await, StatusCode::SERVICE_UNAVAILABLE);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // AuthRejection Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn auth_rejection_returns_401_json() {
        let response = AuthRejection::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "UNAUTHENTICATED");
    }

    #[test]
    fn auth_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthState>();
        assert_send_sync::<RequireAuth>();
    }
}
