//! Envelope definitions for the SurveilX real-time channel.
//!
//! Every transport frame carries exactly one JSON object, internally tagged
//! by `type`:
//!
//! ```text
//! {"type":"exit_confirmation","pending_id":"p1","token":"t1","message":"Leaving?"}
//! {"type":"response","pending_id":"p1","token":"t1","confirmed":true}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Close code for an intentional, clean shutdown of the socket.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the socket went away without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Reason sent alongside [`CLOSE_NORMAL`] when the client hangs up.
pub const USER_DISCONNECT_REASON: &str = "User initiated disconnect";

/// Prompt shown when the backend sends a challenge without a message.
pub const DEFAULT_EXIT_PROMPT: &str = "Are you the one leaving the premises?";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Server greeting after the upgrade was accepted.
    ConnectionAck,
    /// Client heartbeat.
    Ping,
    /// Server answer to [`Envelope::Ping`].
    Pong,
    ExitConfirmation(ExitConfirmation),
    SecurityAlert(SecurityAlertPayload),
    /// Client answer to an [`Envelope::ExitConfirmation`].
    Response(ConfirmationResponse),
}

/// A gate asking the user to confirm they are the one leaving.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitConfirmation {
    #[serde(default)]
    pub pending_id: String,
    /// Challenge token that must be echoed back in the response.
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        rename = "plateNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub plate_number: Option<String>,
    #[serde(
        default,
        rename = "vehicleName",
        skip_serializing_if = "Option::is_none"
    )]
    pub vehicle_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityAlertPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmationResponse {
    pub pending_id: String,
    pub token: String,
    pub confirmed: bool,
}

impl Envelope {
    /// Parse a single text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Build the answer to a challenge.
    pub fn response(pending_id: impl Into<String>, token: impl Into<String>, confirmed: bool) -> Self {
        Envelope::Response(ConfirmationResponse {
            pending_id: pending_id.into(),
            token: token.into(),
            confirmed,
        })
    }

    /// Wire name of this envelope's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::ConnectionAck => "connection_ack",
            Envelope::Ping => "ping",
            Envelope::Pong => "pong",
            Envelope::ExitConfirmation(_) => "exit_confirmation",
            Envelope::SecurityAlert(_) => "security_alert",
            Envelope::Response(_) => "response",
        }
    }
}
