//! Transport ports.
//!
//! The bridge only needs an ordered, bidirectional stream of text frames.
//! `Connector` opens one, `Link` carries it. The WebSocket client is the
//! production adapter, the in-memory loopback backs tests and embedders
//! that already own a connection.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;

pub use memory::{MemoryConnector, MemoryGateway, MemoryPeer};
pub use websocket::WebSocketConnector;

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("connection closed")]
    Closed,
}

/// One open connection to the gateway.
#[async_trait]
pub trait Link: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Next text frame, `None` once the peer has closed the connection.
    ///
    /// Must be cancel safe: the bridge polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection gracefully.
    async fn close(&mut self) {}
}

/// Opens links to a gateway endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>, TransportError>;
}
