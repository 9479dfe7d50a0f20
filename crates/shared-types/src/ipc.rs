//! # Gateway Frames
//!
//! Request and response frames exchanged with the gateway daemon.
//!
//! Every outbound action carries an `echo` token; the daemon copies it into
//! the matching response so responses can arrive in any order.

use crate::errors::FrameError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status sentinel the daemon uses for a failed action.
pub const STATUS_FAILED: &str = "failed";

/// An action request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Remote operation, e.g. `send_group_msg`.
    pub action: String,
    /// Action parameters. Always a JSON object on the wire.
    pub params: Value,
    /// Correlation token echoed back in the response.
    pub echo: String,
}

impl OutboundRequest {
    pub fn new(action: impl Into<String>, params: Value, echo: impl Into<String>) -> Self {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self {
            action: action.into(),
            params,
            echo: echo.into(),
        }
    }

    /// Serialize to the text frame sent over the transport.
    pub fn to_frame(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A response to an earlier action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub echo: String,
    /// `"ok"`, `"async"` or `"failed"`. Anything but `"failed"` is success.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub retcode: Option<i64>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
    /// Human readable variant of `msg` some daemons send instead.
    #[serde(default)]
    pub wording: Option<String>,
}

impl ResponseFrame {
    /// Read a response out of a parsed frame.
    ///
    /// Fields of an unexpected type are treated as absent, so a reply with a
    /// numeric `msg` still resolves its call. `None` when there is no string
    /// `echo`.
    pub fn from_frame(frame: &Value) -> Option<Self> {
        let text = |name: &str| frame.get(name).and_then(Value::as_str).map(str::to_owned);
        Some(Self {
            echo: frame_echo(frame)?.to_owned(),
            status: text("status"),
            retcode: frame.get("retcode").and_then(Value::as_i64),
            data: frame.get("data").cloned(),
            msg: text("msg"),
            wording: text("wording"),
        })
    }

    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some(STATUS_FAILED)
    }

    /// The message reported for a failed action.
    pub fn failure_message(&self) -> String {
        if let Some(msg) = self.msg.as_ref().or(self.wording.as_ref()) {
            return msg.clone();
        }
        match self.retcode {
            Some(code) => format!("retcode {}", code),
            None => "request failed".to_string(),
        }
    }

    /// Success payload (missing data becomes `null`) or the failure message.
    pub fn into_outcome(self) -> Result<Value, String> {
        if self.is_failed() {
            Err(self.failure_message())
        } else {
            Ok(self.data.unwrap_or(Value::Null))
        }
    }
}

/// Parse a text frame into a JSON object.
pub fn parse_frame(text: &str) -> Result<Value, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }
    Ok(value)
}

/// The `echo` field of a frame, when it is a string.
pub fn frame_echo(frame: &Value) -> Option<&str> {
    frame.get("echo").and_then(Value::as_str)
}
