//! Client error types.

use surveilx_shared::ProtocolError;

/// Failure to open a transport. Every variant is transient: the connection
/// manager answers it with a backoff reconnect.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("invalid websocket url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("websocket handshake rejected with HTTP {0}")]
    Rejected(u16),
}

/// Errors reported to callers of the session API.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The socket is not open; nothing was sent and no state changed.
    #[error("websocket is not connected")]
    NotConnected,
    /// `respond` was called without an outstanding exit confirmation.
    #[error("no exit confirmation is pending")]
    NothingPending,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The session task has shut down.
    #[error("session has been shut down")]
    Stopped,
}

/// Token file could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no platform config directory")]
    NoConfigDir,
    #[error("token file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
