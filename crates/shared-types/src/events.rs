//! # Gateway Events
//!
//! Inbound notifications that are not answers to a request.
//!
//! Classification looks at `post_type` first, then at the secondary
//! discriminant (`message_type` or `meta_event_type`). Shapes we do not know
//! are reported as `None` so callers can drop them without treating them as
//! errors; newer daemons add event kinds all the time.

use crate::entities::{MessageChain, Sender, Uin};
use crate::errors::FrameError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMessageSubType {
    #[default]
    Normal,
    Anonymous,
    Notice,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivateMessageSubType {
    #[default]
    Friend,
    Group,
    #[serde(other)]
    Other,
}

/// `post_type = "message"`, `message_type = "group"`.
///
/// Daemons differ in which fields they fill; absent ids decode as `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    #[serde(default)]
    pub sub_type: GroupMessageSubType,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub group_id: Uin,
    #[serde(default)]
    pub user_id: Uin,
    #[serde(default)]
    pub message: MessageChain,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub sender: Sender,
}

/// `post_type = "message"`, `message_type = "private"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessage {
    #[serde(default)]
    pub sub_type: PrivateMessageSubType,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub user_id: Uin,
    #[serde(default)]
    pub message: MessageChain,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub sender: Sender,
}

/// `post_type = "meta_event"`, `meta_event_type = "heartbeat"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Milliseconds until the next heartbeat.
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub status: Value,
}

/// `post_type = "meta_event"`, `meta_event_type = "lifecycle"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// `connect`, `enable` or `disable`.
    #[serde(default)]
    pub sub_type: String,
}

/// A classified inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatewayEvent {
    GroupMessage(GroupMessage),
    PrivateMessage(PrivateMessage),
    Heartbeat(Heartbeat),
    Lifecycle(Lifecycle),
}

/// The discriminant of a known event shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GroupMessage,
    PrivateMessage,
    Heartbeat,
    Lifecycle,
}

impl EventKind {
    /// Detect a known event shape from the frame's discriminant fields.
    pub fn detect(frame: &Value) -> Option<Self> {
        let field = |name: &str| frame.get(name).and_then(Value::as_str);

        match (field("post_type")?, field("message_type"), field("meta_event_type")) {
            ("message", Some("group"), _) => Some(EventKind::GroupMessage),
            ("message", Some("private"), _) => Some(EventKind::PrivateMessage),
            ("meta_event", _, Some("heartbeat")) => Some(EventKind::Heartbeat),
            ("meta_event", _, Some("lifecycle")) => Some(EventKind::Lifecycle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GroupMessage => "group_message",
            EventKind::PrivateMessage => "private_message",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Lifecycle => "lifecycle",
        }
    }
}

impl GatewayEvent {
    /// Translate a frame into an event.
    ///
    /// - `None`: not a shape we know, drop it.
    /// - `Some(Err(_))`: a known shape whose body does not decode.
    pub fn from_frame(frame: &Value) -> Option<Result<Self, FrameError>> {
        let kind = EventKind::detect(frame)?;

        let decoded = match kind {
            EventKind::GroupMessage => {
                GroupMessage::deserialize(frame).map(GatewayEvent::GroupMessage)
            }
            EventKind::PrivateMessage => {
                PrivateMessage::deserialize(frame).map(GatewayEvent::PrivateMessage)
            }
            EventKind::Heartbeat => Heartbeat::deserialize(frame).map(GatewayEvent::Heartbeat),
            EventKind::Lifecycle => Lifecycle::deserialize(frame).map(GatewayEvent::Lifecycle),
        };

        Some(decoded.map_err(|e| FrameError::InvalidBody {
            kind: kind.as_str(),
            reason: e.to_string(),
        }))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::GroupMessage(_) => EventKind::GroupMessage,
            GatewayEvent::PrivateMessage(_) => EventKind::PrivateMessage,
            GatewayEvent::Heartbeat(_) => EventKind::Heartbeat,
            GatewayEvent::Lifecycle(_) => EventKind::Lifecycle,
        }
    }
}
