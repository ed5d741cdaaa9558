//! Stream gateway listener configuration
//!
//! There is no request timeout setting. A stream stays open until the peer
//! leaves or the server shuts down; heartbeats keep idle proxies from
//! cutting it.

use serde::Deserialize;
use std::net::SocketAddr;

use super::error::ValidationError;

/// Where and how the stream gateway listens
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface the gateway binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port serving `/api/notifications/stream` and `/health`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment; production switches logs to JSON and
    /// enforces the session secret length
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Comma-separated browser origins allowed to open a stream with the
    /// session cookie. Unset disables CORS handling.
    pub cors_origins: Option<String>,
}

/// Deployment environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    /// Address the gateway listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ValidationError::InvalidBindAddress(format!("{}:{}", self.host, self.port)))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Stream origins, trimmed, blanks dropped
    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_ref()
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate listener configuration
    ///
    /// Streams are opened with credentials, which browsers never allow for
    /// a wildcard origin, so `*` is refused.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        self.socket_addr()?;
        if self.cors_origins_list().iter().any(|origin| origin == "*") {
            return Err(ValidationError::WildcardCorsOrigin);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_log_level() -> String {
    "info,marketplace_relay=debug".to_string()
}
