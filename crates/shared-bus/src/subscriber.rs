//! # Event Subscriber
//!
//! Listener handles and the stream adaptor.

use crate::events::{BusEvent, Channel};
use crate::publisher::EventBus;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

/// Error a listener may report. Logged by the bus, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

pub type ListenerResult = Result<(), ListenerError>;

/// Identifies one registered listener, for later removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    channel: Channel,
    id: u64,
}

impl ListenerHandle {
    pub(crate) fn new(channel: Channel, id: u64) -> Self {
        Self { channel, id }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Events of one channel as a `Stream`.
///
/// When dropped, the underlying listener is removed from the bus.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<BusEvent>,
    handle: ListenerHandle,
    bus: EventBus,
}

impl EventStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<BusEvent>,
        handle: ListenerHandle,
        bus: EventBus,
    ) -> Self {
        Self {
            receiver,
            handle,
            bus,
        }
    }

    pub fn channel(&self) -> &Channel {
        self.handle.channel()
    }

    /// Next event, `None` once the listener has been removed.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.receiver.recv().await
    }
}

impl Stream for EventStream {
    type Item = BusEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.handle);
        debug!(channel = %self.handle.channel(), "Event stream dropped");
    }
}
