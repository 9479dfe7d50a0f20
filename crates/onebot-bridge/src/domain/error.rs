//! Bridge error types.

/// Errors surfaced to callers of the bridge.
///
/// `MalformedFrame` is only ever logged: a frame that cannot be parsed is
/// dropped and does not fail any pending call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// A call was attempted while the gateway link was down.
    #[error("not connected to the gateway")]
    NotConnected,

    /// The link dropped before the response arrived.
    #[error("gateway connection lost before a response arrived")]
    ConnectionLost,

    /// The gateway answered with `status: "failed"`.
    #[error("gateway reported failure: {0}")]
    RemoteFailed(String),

    /// An inbound frame could not be parsed.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A successful response did not decode into the expected type.
    #[error("unexpected response payload: {0}")]
    UnexpectedPayload(String),

    /// The request could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl BridgeError {
    /// Whether the failure came from the link rather than the gateway.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, BridgeError::NotConnected | BridgeError::ConnectionLost)
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
