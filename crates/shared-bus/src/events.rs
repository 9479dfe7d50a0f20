//! # Bus Events
//!
//! Channel identities and the payloads published on them.

use serde::Serialize;
use serde_json::Value;
use shared_types::{EventKind, GatewayEvent};
use std::fmt;

/// A channel on the bus.
///
/// Known categories get their own variant; `Named` is the fallback for
/// channels that only exist by convention between publisher and subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    /// The gateway link came up.
    LinkEstablished,
    /// The gateway link went down.
    LinkLost,
    GroupMessage,
    PrivateMessage,
    Heartbeat,
    Lifecycle,
    Named(String),
}

impl Channel {
    pub fn named(name: impl Into<String>) -> Self {
        Channel::Named(name.into())
    }

    /// Channels the gateway bridge publishes on.
    pub fn gateway_channels() -> [Channel; 6] {
        [
            Channel::LinkEstablished,
            Channel::LinkLost,
            Channel::GroupMessage,
            Channel::PrivateMessage,
            Channel::Heartbeat,
            Channel::Lifecycle,
        ]
    }

    /// Channel an inbound gateway event is published on.
    pub fn for_event(event: &GatewayEvent) -> Self {
        Channel::from(event.kind())
    }
}

impl From<EventKind> for Channel {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::GroupMessage => Channel::GroupMessage,
            EventKind::PrivateMessage => Channel::PrivateMessage,
            EventKind::Heartbeat => Channel::Heartbeat,
            EventKind::Lifecycle => Channel::Lifecycle,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::LinkEstablished => write!(f, "gateway.link_established"),
            Channel::LinkLost => write!(f, "gateway.link_lost"),
            Channel::GroupMessage => write!(f, "gateway.group_message"),
            Channel::PrivateMessage => write!(f, "gateway.private_message"),
            Channel::Heartbeat => write!(f, "gateway.heartbeat"),
            Channel::Lifecycle => write!(f, "gateway.lifecycle"),
            Channel::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BusEvent {
    LinkEstablished {
        endpoint: String,
    },
    LinkLost {
        endpoint: String,
        reason: String,
    },
    Gateway(GatewayEvent),
    /// Free-form payload for `Channel::Named` channels.
    Custom(Value),
}
