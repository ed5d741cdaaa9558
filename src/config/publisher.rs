//! Outcome publisher configuration
//!
//! Read by the `publish-outcome` tool. It shares the gateway's
//! `MARKETPLACE_RELAY__REDIS__*` variables and ignores every other section,
//! so publishing needs no session secret.
//!
//! - `MARKETPLACE_RELAY__REDIS__URL=redis://localhost:6379`
//! - `MARKETPLACE_RELAY__LOG_LEVEL=info`

use serde::Deserialize;

use super::error::{ConfigError, ValidationError};
use super::redis::RedisConfig;

/// Outcome publisher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Bus the outcome is published on. Must be a real Redis instance.
    pub redis: RedisConfig,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl PublisherConfig {
    /// Load publisher configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `REDIS__URL` is missing or a value does not
    /// parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MARKETPLACE_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate publisher configuration
    ///
    /// The in-process bus is refused: nothing outside this process could
    /// receive what it publishes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.redis.validate()?;
        if self.redis.is_in_memory() {
            return Err(ValidationError::InProcessPublisher);
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
