//! # Event Publisher
//!
//! The channel registry and the publishing side of the bus.

use crate::events::{BusEvent, Channel};
use crate::subscriber::{EventStream, ListenerHandle, ListenerResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Errors from bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The channel was never created.
    #[error("unknown event channel: {0}")]
    UnknownChannel(Channel),
}

pub(crate) type Listener = Arc<dyn Fn(BusEvent) -> ListenerResult + Send + Sync>;

struct Registered {
    id: u64,
    listener: Listener,
}

struct BusInner {
    channels: RwLock<HashMap<Channel, Vec<Registered>>>,
    next_listener_id: AtomicU64,
    events_published: AtomicU64,
}

/// In-memory event bus.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
                events_published: AtomicU64::new(0),
            }),
        }
    }

    /// Register a channel.
    ///
    /// Returns `false` if it already existed; its listeners are kept.
    pub fn create(&self, channel: Channel) -> bool {
        let mut channels = self.inner.channels.write();
        if channels.contains_key(&channel) {
            return false;
        }
        debug!(channel = %channel, "Event channel created");
        channels.insert(channel, Vec::new());
        true
    }

    pub fn has_channel(&self, channel: &Channel) -> bool {
        self.inner.channels.read().contains_key(channel)
    }

    /// Append a listener to a channel.
    pub fn subscribe<F>(&self, channel: &Channel, listener: F) -> Result<ListenerHandle, BusError>
    where
        F: Fn(BusEvent) -> ListenerResult + Send + Sync + 'static,
    {
        let mut channels = self.inner.channels.write();
        let listeners = channels
            .get_mut(channel)
            .ok_or_else(|| BusError::UnknownChannel(channel.clone()))?;

        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        listeners.push(Registered {
            id,
            listener: Arc::new(listener),
        });

        debug!(channel = %channel, listener_id = id, "Listener subscribed");
        Ok(ListenerHandle::new(channel.clone(), id))
    }

    /// Receive a channel's events as an async stream.
    ///
    /// Dropping the stream removes its listener.
    pub fn stream(&self, channel: &Channel) -> Result<EventStream, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.subscribe(channel, move |event| {
            // The receiver only goes away when the stream is dropped, which
            // also unsubscribes us.
            let _ = tx.send(event);
            Ok(())
        })?;
        Ok(EventStream::new(rx, handle, self.clone()))
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &ListenerHandle) -> bool {
        let mut channels = self.inner.channels.write();
        let Some(listeners) = channels.get_mut(handle.channel()) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|registered| registered.id != handle.id());
        let removed = listeners.len() != before;
        if removed {
            debug!(channel = %handle.channel(), listener_id = handle.id(), "Listener removed");
        }
        removed
    }

    /// Deliver an event to every listener of a channel.
    ///
    /// Returns the number of listeners invoked, including ones that failed.
    pub fn publish(&self, channel: &Channel, event: BusEvent) -> Result<usize, BusError> {
        let snapshot: Vec<(u64, Listener)> = {
            let channels = self.inner.channels.read();
            let Some(listeners) = channels.get(channel) else {
                warn!(channel = %channel, "Publish to unknown channel");
                return Err(BusError::UnknownChannel(channel.clone()));
            };
            listeners
                .iter()
                .map(|registered| (registered.id, Arc::clone(&registered.listener)))
                .collect()
        };

        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        for (id, listener) in &snapshot {
            let payload = event.clone();
            match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(channel = %channel, listener_id = id, error = %e, "Listener failed");
                }
                Err(_) => {
                    error!(channel = %channel, listener_id = id, "Listener panicked");
                }
            }
        }

        debug!(channel = %channel, listeners = snapshot.len(), "Event published");
        Ok(snapshot.len())
    }

    /// Number of listeners on a channel, `None` if it does not exist.
    pub fn listener_count(&self, channel: &Channel) -> Option<usize> {
        self.inner.channels.read().get(channel).map(Vec::len)
    }

    /// Total successful publishes.
    pub fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels = self.inner.channels.read();
        f.debug_struct("EventBus")
            .field("channels", &channels.len())
            .field("events_published", &self.events_published())
            .finish()
    }
}
