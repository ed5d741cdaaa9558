//! reqwest-backed event stream transport.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use secrecy::{ExposeSecret, SecretString};

use crate::ports::{EventByteStream, EventStreamTransport, TransportError};

/// Opens the gateway's stream endpoint over HTTP.
pub struct HttpEventStreamTransport {
    client: reqwest::Client,
    url: String,
    token: Option<SecretString>,
}

impl HttpEventStreamTransport {
    /// Create a transport for `url`, sending `token` as a bearer credential
    /// when present.
    ///
    /// Only connection setup is bounded by a timeout; an open stream may stay
    /// idle between heartbeats.
    pub fn new(url: impl Into<String>, token: Option<SecretString>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl EventStreamTransport for HttpEventStreamTransport {
    async fn open(&self) -> Result<EventByteStream, TransportError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| TransportError::Read(e.to_string()))
            .boxed())
    }
}

impl std::fmt::Debug for HttpEventStreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEventStreamTransport")
            .field("url", &self.url)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token() {
        let transport = HttpEventStreamTransport::new(
            "http://localhost:8080/api/notifications/stream",
            Some(SecretString::new("super-secret".to_string())),
        )
        .unwrap();

        let debug = format!("{:?}", transport);
        assert!(debug.contains("has_token: true"));
        assert!(!debug.contains("super-secret"));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_connect_error() {
        let transport =
            HttpEventStreamTransport::new("http://127.0.0.1:1/api/notifications/stream", None)
                .unwrap();

        assert!(matches!(
            transport.open().await,
            Err(TransportError::Connect(_))
        ));
    }
}
