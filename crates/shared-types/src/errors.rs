//! # Error Types
//!
//! Errors raised while decoding gateway frames.

use thiserror::Error;

/// A frame could not be turned into a typed value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The text was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The frame was JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame claimed a known shape but its body did not match it.
    #[error("invalid {kind} body: {reason}")]
    InvalidBody { kind: &'static str, reason: String },
}

impl From<serde_json::Error> for FrameError {
    fn from(e: serde_json::Error) -> Self {
        FrameError::InvalidJson(e.to_string())
    }
}
