//! # Gateway Entities
//!
//! Payloads carried inside events and returned by gateway actions.
//! Optional fields default so that partial payloads still decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// QQ account or group number.
pub type Uin = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Admin,
    #[default]
    #[serde(other)]
    Member,
}

/// The sender block attached to message events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub user_id: Uin,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub age: i32,
    /// Group card (display name inside the group), group messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<GroupRole>,
}

/// One segment of a message chain, e.g. `{"type":"text","data":{"text":"hi"}}`.
///
/// Kept loosely typed: daemons add segment kinds faster than we consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSegment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl MessageSegment {
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("text".to_string(), Value::String(text.into()));
        Self {
            kind: "text".to_string(),
            data,
        }
    }

    /// Text content of a `text` segment.
    pub fn as_text(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.data.get("text").and_then(Value::as_str)
    }

    /// Target of an `at` segment. Daemons send the number either as a
    /// string or as an integer; `"all"` yields `None`.
    pub fn at_target(&self) -> Option<Uin> {
        if self.kind != "at" {
            return None;
        }
        match self.data.get("qq")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// URL of an `image` segment.
    pub fn image_url(&self) -> Option<&str> {
        if self.kind != "image" {
            return None;
        }
        self.data.get("url").and_then(Value::as_str)
    }
}

/// Message body: a segment array, or a CQ-code string when the daemon is
/// configured for string-format messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageChain {
    Segments(Vec<MessageSegment>),
    Raw(String),
}

impl Default for MessageChain {
    fn default() -> Self {
        MessageChain::Segments(Vec::new())
    }
}

impl MessageChain {
    /// Concatenated text of all `text` segments.
    pub fn plain_text(&self) -> String {
        match self {
            MessageChain::Segments(segments) => {
                segments.iter().filter_map(MessageSegment::as_text).collect()
            }
            MessageChain::Raw(raw) => raw.clone(),
        }
    }

    /// Accounts mentioned with `at` segments.
    pub fn mentions(&self) -> Vec<Uin> {
        match self {
            MessageChain::Segments(segments) => {
                segments.iter().filter_map(MessageSegment::at_target).collect()
            }
            MessageChain::Raw(_) => Vec::new(),
        }
    }
}

/// Result of `get_group_member_info`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMemberInfo {
    pub group_id: Uin,
    pub user_id: Uin,
    pub nickname: String,
    pub card: String,
    pub sex: Sex,
    pub age: i32,
    pub area: String,
    pub join_time: i64,
    pub last_sent_time: i64,
    pub level: String,
    pub role: GroupRole,
    pub unfriendly: bool,
    pub title: String,
    pub title_expire_time: i64,
    pub card_changeable: bool,
    pub shut_up_timestamp: i64,
}

impl GroupMemberInfo {
    /// Card if set, nickname otherwise.
    pub fn display_name(&self) -> &str {
        if self.card.is_empty() {
            &self.nickname
        } else {
            &self.card
        }
    }
}

/// Result of `get_login_info`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoginInfo {
    pub user_id: Uin,
    #[serde(default)]
    pub nickname: String,
}

/// Result of `send_group_msg` / `send_private_msg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: i64,
}
