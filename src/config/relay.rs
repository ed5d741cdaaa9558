//! Stream gateway tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Stream gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Seconds between heartbeat comments on an idle stream
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Messages buffered per subscription before the bus drops new ones
    #[serde(default = "default_message_buffer")]
    pub message_buffer: usize,
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Validate gateway configuration
    ///
    /// The heartbeat must stay well inside common proxy idle timeouts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=60).contains(&self.heartbeat_interval_secs) {
            return Err(ValidationError::InvalidHeartbeatInterval);
        }
        if self.message_buffer == 0 {
            return Err(ValidationError::InvalidMessageBuffer);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            message_buffer: default_message_buffer(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_message_buffer() -> usize {
    64
}
