//! Domain types for the gateway bridge.
//!
//! Correlation ids, the pending call table, configuration and errors.

pub mod config;
pub mod correlation;
pub mod error;
pub mod pending;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError, DEFAULT_GATEWAY_URL, DEFAULT_RECONNECT_DELAY};
pub use correlation::CorrelationId;
pub use error::{BridgeError, BridgeResult};
pub use pending::{CallOutcome, PendingCallTable, PendingReceiver, PendingStats};
