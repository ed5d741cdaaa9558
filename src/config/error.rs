//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Wildcard CORS origin cannot carry session credentials")]
    WildcardCorsOrigin,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid Redis timeout")]
    InvalidRedisTimeout,

    #[error("Outcomes cannot be published on the in-process bus")]
    InProcessPublisher,

    #[error("Session secret must be at least {0} bytes in production")]
    SecretTooShort(usize),

    #[error("Invalid session cookie name")]
    InvalidCookieName,

    #[error("Heartbeat interval must be between 1 and 60 seconds")]
    InvalidHeartbeatInterval,

    #[error("Message buffer must hold at least one message")]
    InvalidMessageBuffer,

    #[error("Invalid stream URL format")]
    InvalidStreamUrl,

    #[error("Reconnect delays must satisfy 1 <= base <= max")]
    InvalidReconnectDelay,
}
