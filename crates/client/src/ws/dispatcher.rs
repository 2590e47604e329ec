//! Inbound frame decoding and routing.

use surveilx_shared::{Envelope, ExitConfirmation};

use crate::subscription::Subscribers;

/// Where a decoded envelope goes after the raw-stream subscribers saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Ack,
    Pong,
    Confirmation(ExitConfirmation),
    /// Alert text; `None` when the server sent no message.
    Alert(Option<String>),
    /// A client-to-server kind arriving from the server.
    Unexpected(&'static str),
}

impl From<Envelope> for Route {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::ConnectionAck => Route::Ack,
            Envelope::Pong => Route::Pong,
            Envelope::ExitConfirmation(challenge) => Route::Confirmation(challenge),
            Envelope::SecurityAlert(alert) => Route::Alert(alert.message),
            other @ (Envelope::Ping | Envelope::Response(_)) => Route::Unexpected(other.kind()),
        }
    }
}

pub(crate) struct Dispatcher {
    subscribers: Subscribers<Envelope>,
}

impl Dispatcher {
    pub fn new(subscribers: Subscribers<Envelope>) -> Self {
        Self { subscribers }
    }

    /// Decode one text frame and multicast it. Undecodable frames are logged
    /// and dropped; the connection is not affected.
    pub fn dispatch(&self, frame: &str) -> Option<Route> {
        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, frame = %preview(frame), "dropping undecodable frame");
                return None;
            }
        };
        tracing::debug!(kind = envelope.kind(), "frame received");
        self.subscribers.emit(&envelope);
        Some(Route::from(envelope))
    }
}

fn preview(frame: &str) -> &str {
    const MAX: usize = 120;
    if frame.len() <= MAX {
        return frame;
    }
    let mut end = MAX;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    &frame[..end]
}
