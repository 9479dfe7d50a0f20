//! In-memory loopback transport.
//!
//! `MemoryConnector` hands the bridge one end of a channel pair per
//! connection; the other end surfaces as a `MemoryPeer` on the paired
//! `MemoryGateway`, which plays the daemon.

use super::{Connector, Link, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::OutboundRequest;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug)]
struct Switchboard {
    refuse: AtomicBool,
    attempts: AtomicUsize,
    /// While `true`, connection attempts wait before being answered.
    hold: watch::Sender<bool>,
}

/// Client side of the loopback.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<MemoryPeer>,
    switchboard: Arc<Switchboard>,
}

impl MemoryConnector {
    /// A connector and the gateway that receives its connections.
    pub fn pair() -> (MemoryConnector, MemoryGateway) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let switchboard = Arc::new(Switchboard {
            refuse: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            hold: watch::channel(false).0,
        });
        (
            MemoryConnector {
                accepted: accepted_tx,
                switchboard: Arc::clone(&switchboard),
            },
            MemoryGateway {
                accepted: accepted_rx,
                switchboard,
            },
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Link>, TransportError> {
        self.switchboard.attempts.fetch_add(1, Ordering::SeqCst);

        let mut held = self.switchboard.hold.subscribe();
        // The sender lives in the switchboard, which `self` keeps alive.
        let _ = held.wait_for(|hold| !*hold).await;

        if self.switchboard.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("{} refused connection", url)));
        }

        let (to_bridge, from_gateway) = mpsc::unbounded_channel();
        let (to_gateway, from_bridge) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            to_bridge,
            from_bridge,
        };
        self.accepted
            .send(peer)
            .map_err(|_| TransportError::Connect("gateway is gone".into()))?;

        Ok(Box::new(MemoryLink {
            incoming: from_gateway,
            outgoing: to_gateway,
        }))
    }
}

/// Gateway side of the loopback: accepts connections from a `MemoryConnector`.
#[derive(Debug)]
pub struct MemoryGateway {
    accepted: mpsc::UnboundedReceiver<MemoryPeer>,
    switchboard: Arc<Switchboard>,
}

impl MemoryGateway {
    /// Wait for the bridge's next connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accepted.recv().await
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn set_refusing(&self, refuse: bool) {
        self.switchboard.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Keep connection attempts in flight until released.
    pub fn set_holding(&self, hold: bool) {
        self.switchboard.hold.send_replace(hold);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn connect_attempts(&self) -> usize {
        self.switchboard.attempts.load(Ordering::SeqCst)
    }
}

/// One accepted connection, seen from the gateway.
///
/// Dropping the peer closes the connection.
#[derive(Debug)]
pub struct MemoryPeer {
    to_bridge: mpsc::UnboundedSender<Result<String, TransportError>>,
    from_bridge: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Next raw frame sent by the bridge.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.from_bridge.recv().await
    }

    /// Next frame sent by the bridge, decoded as an action request.
    ///
    /// Frames that are not requests are skipped.
    pub async fn next_request(&mut self) -> Option<OutboundRequest> {
        while let Some(frame) = self.from_bridge.recv().await {
            if let Ok(request) = serde_json::from_str(&frame) {
                return Some(request);
            }
        }
        None
    }

    /// Push a raw text frame to the bridge. Returns `false` once the bridge
    /// side is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_bridge.send(Ok(text.into())).is_ok()
    }

    pub fn send_json(&self, frame: &Value) -> bool {
        self.send_text(frame.to_string())
    }

    /// Fail the connection with a transport error.
    pub fn break_link(&self, reason: impl Into<String>) -> bool {
        self.to_bridge
            .send(Err(TransportError::Receive(reason.into())))
            .is_ok()
    }

    /// Close the connection from the gateway side.
    pub fn close(self) {}
}

struct MemoryLink {
    incoming: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    outgoing: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.incoming.recv().await
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_loopback_exchanges_frames() {
        let (connector, mut gateway) = MemoryConnector::pair();
        let mut link = connector.connect("ws://memory").await.unwrap();
        let mut peer = gateway.accept().await.unwrap();

        link.send(r#"{"action":"get_login_info","params":{},"echo":"e"}"#.into())
            .await
            .unwrap();
        let request = peer.next_request().await.unwrap();
        assert_eq!(request.action, "get_login_info");
        assert_eq!(request.echo, "e");

        assert!(peer.send_json(&json!({"post_type": "meta_event"})));
        let frame = link.recv().await.unwrap().unwrap();
        assert!(frame.contains("meta_event"));
    }

    #[tokio::test]
    async fn test_dropping_peer_closes_link() {
        let (connector, mut gateway) = MemoryConnector::pair();
        let mut link = connector.connect("ws://memory").await.unwrap();
        gateway.accept().await.unwrap().close();

        assert!(link.recv().await.is_none());
        assert_eq!(link.send("x".into()).await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_refusing_gateway() {
        let (connector, gateway) = MemoryConnector::pair();
        gateway.set_refusing(true);

        assert!(matches!(
            connector.connect("ws://memory").await,
            Err(TransportError::Connect(_))
        ));
        assert_eq!(gateway.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_held_connect_waits_for_release() {
        let (connector, mut gateway) = MemoryConnector::pair();
        gateway.set_holding(true);

        let attempt = tokio::spawn(async move { connector.connect("ws://memory").await.is_ok() });
        while gateway.connect_attempts() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!attempt.is_finished());

        gateway.set_holding(false);
        assert!(attempt.await.unwrap());
        assert!(gateway.accept().await.is_some());
    }
}
