//! Shared error types.

/// Failure to turn a transport frame into an [`Envelope`](crate::Envelope)
/// or back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON, had no `type`, or named an unknown type.
    #[error("malformed envelope: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}
