//! Relay listener configuration
//!
//! Loaded separately from [`AppConfig`](super::AppConfig) because the
//! listener runs on the consumer side and shares none of the gateway's
//! settings. Variables use the `MARKETPLACE_RELAY_CLIENT` prefix:
//!
//! - `MARKETPLACE_RELAY_CLIENT__STREAM_URL=http://localhost:8080/api/notifications/stream`
//! - `MARKETPLACE_RELAY_CLIENT__TOKEN=...`

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::notification::ReconnectBackoff;

use super::error::{ConfigError, ValidationError};

/// Client relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Gateway stream endpoint
    pub stream_url: String,

    /// Session token sent as a bearer credential
    pub token: Option<SecretString>,

    /// Delay before the first reconnect, in milliseconds
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Upper bound for reconnect delays, in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ClientConfig {
    /// Load listener configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `STREAM_URL` is missing or a value does not
    /// parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MARKETPLACE_RELAY_CLIENT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn backoff(&self) -> ReconnectBackoff {
        ReconnectBackoff::new(
            Duration::from_millis(self.reconnect_base_ms),
            Duration::from_millis(self.reconnect_max_ms),
        )
    }

    /// Validate listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stream_url.is_empty() {
            return Err(ValidationError::MissingRequired("CLIENT__STREAM_URL"));
        }
        if !self.stream_url.starts_with("http://") && !self.stream_url.starts_with("https://") {
            return Err(ValidationError::InvalidStreamUrl);
        }
        if self.reconnect_base_ms == 0 || self.reconnect_max_ms < self.reconnect_base_ms {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        Ok(())
    }
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info,marketplace_relay=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> ClientConfig {
        ClientConfig {
            stream_url: url.to_string(),
            token: None,
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn test_default_backoff_matches_relay_defaults() {
        let config = config("http://localhost:8080/api/notifications/stream");
        assert_eq!(config.backoff(), ReconnectBackoff::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_url() {
        assert!(matches!(
            config("").validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validation_invalid_url() {
        assert!(matches!(
            config("ws://localhost:8080").validate(),
            Err(ValidationError::InvalidStreamUrl)
        ));
    }

    #[test]
    fn test_validation_max_below_base() {
        let mut config = config("https://relay.example.com/api/notifications/stream");
        config.reconnect_base_ms = 5_000;
        config.reconnect_max_ms = 1_000;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidReconnectDelay)
        ));
    }

    #[test]
    fn test_validation_zero_base() {
        let mut config = config("https://relay.example.com/api/notifications/stream");
        config.reconnect_base_ms = 0;
        assert!(config.validate().is_err());
    }
}
