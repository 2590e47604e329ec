//! Connection state and the transport seam.
//!
//! The session task never touches a socket directly. It asks a [`Connector`]
//! for a [`Link`]: a pair of channels carrying outbound frames and inbound
//! socket events. The native connector pumps those channels to a
//! tokio-tungstenite stream; tests plug in a scripted connector.

use std::fmt;

use async_trait::async_trait;
use surveilx_shared::{CLOSE_NORMAL, USER_DISCONNECT_REASON};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::error::TransportError;

/// Connection state for the session socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Automatic reconnects are exhausted. Left only by `connect` or
    /// `reconnect`.
    Error,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Why a socket closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code from the close frame; `None` when the stream just ended.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close without a close frame (network drop, read error).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(None, reason)
    }

    /// Intentional close by either endpoint.
    pub fn is_clean(&self) -> bool {
        self.code == Some(CLOSE_NORMAL)
    }
}

/// Event surfaced by a live socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    Closed(CloseInfo),
}

/// Frame queued for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

impl OutboundFrame {
    /// The close frame sent for every intentional hang-up.
    pub fn user_close() -> Self {
        OutboundFrame::Close {
            code: CLOSE_NORMAL,
            reason: USER_DISCONNECT_REASON.to_string(),
        }
    }
}

/// An open socket as seen by the session task.
#[derive(Debug)]
pub struct Link {
    outbound: UnboundedSender<OutboundFrame>,
    events: UnboundedReceiver<SocketEvent>,
}

impl Link {
    pub fn new(
        outbound: UnboundedSender<OutboundFrame>,
        events: UnboundedReceiver<SocketEvent>,
    ) -> Self {
        Self { outbound, events }
    }

    /// Whether the writer side is still accepting frames.
    pub fn is_writable(&self) -> bool {
        !self.outbound.is_closed()
    }

    /// Queue a frame. Returns `false` when the writer is gone.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Next socket event. A vanished reader counts as an abnormal close.
    pub async fn next_event(&mut self) -> SocketEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => SocketEvent::Closed(CloseInfo::abnormal("socket reader stopped")),
        }
    }

    /// Send the clean close frame and release the socket.
    pub fn close(self) {
        let _ = self.outbound.send(OutboundFrame::user_close());
    }
}

/// Opens transports for the session task.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Resolve once the socket is open and ready for frames.
    async fn connect(&self, url: &Url) -> Result<Link, TransportError>;
}

/// Build `<base>?token=<token>`, keeping any query the base already has.
pub fn session_url(base: &str, token: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base).map_err(|e| TransportError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    let existing: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(existing)
        .append_pair("token", token);
    Ok(url)
}

mod connection_native;
pub(crate) use connection_native::redact_token;
pub use connection_native::TungsteniteConnector;
