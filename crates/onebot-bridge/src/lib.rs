//! # OneBot Bridge
//!
//! Request/response RPC over the OneBot gateway's WebSocket, plus fan-out of
//! the gateway's unsolicited events onto the shared event bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        onebot-bridge                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ActionClient        typed wrappers (send_group_msg, ...)    │
//! │       │                                                      │
//! │  BridgeHandle        call / state / shutdown                 │
//! │       │                                                      │
//! │  PendingCallTable    echo id → waiting caller                │
//! │       │                                                      │
//! │  Supervisor          connect → pump → wait → reconnect       │
//! │       │                                                      │
//! │  Connector / Link    WebSocket (tungstenite) or in-memory    │
//! └───────┼──────────────────────────────────────────────────────┘
//!         │ events
//!         ▼
//!     shared-bus EventBus
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use onebot_bridge::{ActionClient, BridgeConfig, BridgeHandle, WebSocketConnector};
//! use shared_bus::EventBus;
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let bridge = BridgeHandle::start(
//!     BridgeConfig::new("ws://127.0.0.1:3001"),
//!     Arc::new(WebSocketConnector),
//!     bus.clone(),
//! );
//! bridge.wait_until_open().await?;
//!
//! let client = ActionClient::new(bridge.clone());
//! client.send_group_msg(747121127, "hello", false).await?;
//! ```

pub mod actions;
pub mod bridge;
pub mod domain;
pub mod transport;

pub use actions::{action, ActionClient};
pub use bridge::{BridgeHandle, ConnectionState};
pub use domain::{
    BridgeConfig, BridgeError, BridgeResult, ConfigError, CorrelationId, PendingCallTable,
    DEFAULT_GATEWAY_URL, DEFAULT_RECONNECT_DELAY,
};
pub use transport::{
    Connector, Link, MemoryConnector, MemoryGateway, MemoryPeer, TransportError,
    WebSocketConnector,
};
