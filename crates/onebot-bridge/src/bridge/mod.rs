//! # Gateway Bridge
//!
//! Owns the connection to the gateway daemon. A background supervisor task
//! connects, pumps frames in both directions and reconnects after a fixed
//! delay whenever the link drops. Callers interact through `BridgeHandle`.
//!
//! ```text
//!  call() ──► [slot: Open(tx)] ──► outbound queue ──► Link::send
//!    ▲                                                    │
//!    │ oneshot                                         gateway
//!    │                                                    │
//!  PendingCallTable ◄── response (echo) ◄── route ◄── Link::recv
//!                                             │
//!                                  event ──► EventBus
//! ```
//!
//! The link slot and the pending table are only changed together under the
//! slot lock, so a call is either registered before the link closes (and is
//! then rejected with `ConnectionLost`) or sees the closed link and fails
//! with `NotConnected`.

mod inbound;
mod supervisor;

use crate::domain::{
    BridgeConfig, BridgeError, BridgeResult, CorrelationId, PendingCallTable,
};
use crate::transport::Connector;
use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{Channel, EventBus};
use shared_types::OutboundRequest;
use std::sync::Arc;
use supervisor::Supervisor;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Connection state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

enum LinkSlot {
    Connecting,
    Open(mpsc::UnboundedSender<String>),
    Closed,
}

impl LinkSlot {
    fn state(&self) -> ConnectionState {
        match self {
            LinkSlot::Connecting => ConnectionState::Connecting,
            LinkSlot::Open(_) => ConnectionState::Open,
            LinkSlot::Closed => ConnectionState::Closed,
        }
    }
}

/// State shared between handles and the supervisor task.
pub(crate) struct Shared {
    config: BridgeConfig,
    slot: Mutex<LinkSlot>,
    state_tx: watch::Sender<ConnectionState>,
    pending: PendingCallTable,
    bus: EventBus,
}

impl Shared {
    fn set_slot(&self, slot: &mut LinkSlot, next: LinkSlot) {
        *slot = next;
        self.state_tx.send_replace(slot.state());
    }

    pub(crate) fn mark_connecting(&self) {
        let mut slot = self.slot.lock();
        self.set_slot(&mut slot, LinkSlot::Connecting);
    }

    pub(crate) fn mark_open(&self, outbound: mpsc::UnboundedSender<String>) {
        let mut slot = self.slot.lock();
        self.set_slot(&mut slot, LinkSlot::Open(outbound));
    }

    /// Mark the link closed and fail every call still waiting on it.
    pub(crate) fn mark_closed(&self) -> usize {
        let mut slot = self.slot.lock();
        self.set_slot(&mut slot, LinkSlot::Closed);
        self.pending.reject_all(BridgeError::ConnectionLost)
    }

    pub(crate) fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub(crate) fn pending(&self) -> &PendingCallTable {
        &self.pending
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }
}

/// Owned by handles only. When the last handle goes, the shutdown sender
/// drops with it and the supervisor stops.
struct Control {
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Control {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Handle to a running bridge.
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// clone stops the bridge as `shutdown` would, without waiting for it.
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<Shared>,
    control: Arc<Control>,
}

impl BridgeHandle {
    /// Start the bridge and its supervisor task.
    ///
    /// The gateway channels are created on `bus` before the first connection
    /// attempt. Must be called from within a Tokio runtime.
    pub fn start(config: BridgeConfig, connector: Arc<dyn Connector>, bus: EventBus) -> Self {
        for channel in Channel::gateway_channels() {
            bus.create(channel);
        }

        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            config,
            slot: Mutex::new(LinkSlot::Connecting),
            state_tx,
            pending: PendingCallTable::new(),
            bus,
        });

        let supervisor = Supervisor::new(Arc::clone(&shared), connector, shutdown_rx);
        let task = tokio::spawn(supervisor.run());
        let control = Arc::new(Control {
            shutdown_tx,
            task: Mutex::new(Some(task)),
        });

        Self { shared, control }
    }

    /// Send an action to the gateway and wait for its response.
    ///
    /// Fails immediately with `NotConnected` when the link is not open.
    /// There is no timeout: a call the gateway never answers stays pending
    /// until the link drops.
    pub async fn call(&self, action: &str, params: Value) -> BridgeResult<Value> {
        let (id, receiver) = {
            let slot = self.shared.slot.lock();
            let LinkSlot::Open(outbound) = &*slot else {
                debug!(action, state = %slot.state(), "Call rejected, gateway link is not open");
                return Err(BridgeError::NotConnected);
            };

            let pending = &self.shared.pending;
            let (id, receiver) = loop {
                let id = CorrelationId::new();
                if let Some(receiver) = pending.register(id, action) {
                    break (id, receiver);
                }
            };

            let frame = match OutboundRequest::new(action, params, id.to_string()).to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    pending.cancel(&id);
                    return Err(BridgeError::Encode(e.to_string()));
                }
            };

            // The pump has already let go of the link but not yet marked it
            // closed.
            if outbound.send(frame).is_err() {
                pending.cancel(&id);
                return Err(BridgeError::ConnectionLost);
            }
            (id, receiver)
        };

        debug!(correlation_id = %id, action, "Sent gateway action");
        receiver.await.unwrap_or(Err(BridgeError::ConnectionLost))
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the link is open.
    ///
    /// Fails with `NotConnected` once the bridge has been shut down, since
    /// the link will never open again.
    pub async fn wait_until_open(&self) -> BridgeResult<()> {
        let mut states = self.shared.state_tx.subscribe();
        let mut stopped = self.control.shutdown_tx.subscribe();

        tokio::select! {
            opened = states.wait_for(|state| *state == ConnectionState::Open) => {
                opened.map(|_| ()).map_err(|_| BridgeError::NotConnected)
            }
            _ = stopped.wait_for(|stop| *stop) => Err(BridgeError::NotConnected),
        }
    }

    /// Number of calls waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Stop the supervisor, close the link and fail outstanding calls.
    ///
    /// Idempotent; once stopped the bridge stays `Closed`.
    pub async fn shutdown(&self) {
        self.control.shutdown_tx.send_replace(true);
        let task = self.control.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Bridge supervisor ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("url", &self.shared.config.url)
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
