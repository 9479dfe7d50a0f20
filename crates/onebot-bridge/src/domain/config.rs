//! Bridge configuration with validation.

use std::time::Duration;

/// Gateway endpoint used when none is configured.
pub const DEFAULT_GATEWAY_URL: &str = "ws://10.0.0.2:3001";

/// Pause between a lost or refused connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Where the bridge connects and how it retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// `ws://` or `wss://` endpoint of the gateway daemon
    pub url: String,
    /// Fixed delay between connection attempts
    pub reconnect_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::InvalidUrl("url cannot be empty".into()));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(format!(
                "{} is not a ws:// or wss:// url",
                self.url
            )));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::InvalidDelay(
                "reconnect_delay cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
    #[error("invalid reconnect delay: {0}")]
    InvalidDelay(String),
}
