//! Exit-confirmation state: at most one outstanding gate challenge.
//!
//! `None` in the store means Idle. A challenge moves it to Awaiting until the
//! user responds, the expiry deadline passes, or the session is torn down.
//! Responded and Expired are not stored: both fall straight back to Idle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use surveilx_shared::{Envelope, ExitConfirmation, DEFAULT_EXIT_PROMPT};

use crate::ws::timer::Deadline;

/// The challenge currently awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingConfirmation {
    pub pending_id: String,
    pub challenge_token: String,
    pub message: String,
    pub plate_number: Option<String>,
    pub vehicle_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Wall-clock deadline, for display. The authoritative timer is monotonic.
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    /// The `response` envelope answering this challenge.
    pub fn response(&self, confirmed: bool) -> Envelope {
        Envelope::response(self.pending_id.clone(), self.challenge_token.clone(), confirmed)
    }
}

/// How an exit confirmation left the Awaiting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    Denied,
    /// Nobody answered before the deadline. Nothing was sent.
    Expired,
    /// A newer challenge replaced this one.
    Superseded,
    /// The session was torn down while the challenge was open.
    Discarded,
}

impl ConfirmationOutcome {
    pub fn answered(confirmed: bool) -> Self {
        if confirmed {
            ConfirmationOutcome::Confirmed
        } else {
            ConfirmationOutcome::Denied
        }
    }
}

#[derive(Debug)]
pub(crate) struct ConfirmationTracker {
    timeout: Duration,
    pending: Option<PendingConfirmation>,
    expiry: Deadline,
}

impl ConfirmationTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: None,
            expiry: Deadline::default(),
        }
    }

    /// Enter Awaiting for `challenge`, replacing any open one (last writer
    /// wins) and restarting the expiry. Returns the replaced challenge.
    pub fn begin(&mut self, challenge: ExitConfirmation) -> Option<PendingConfirmation> {
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::zero());
        let message = challenge
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXIT_PROMPT.to_string());

        let replaced = self.pending.replace(PendingConfirmation {
            pending_id: challenge.pending_id,
            challenge_token: challenge.token,
            message,
            plate_number: challenge.plate_number,
            vehicle_name: challenge.vehicle_name,
            created_at,
            expires_at,
        });
        self.expiry.arm(self.timeout);
        replaced
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Return to Idle, cancelling the expiry.
    pub fn clear(&mut self) -> Option<PendingConfirmation> {
        self.expiry.cancel();
        self.pending.take()
    }

    /// Resolves when the open challenge runs out of time.
    pub async fn expired(&self) {
        self.expiry.elapsed().await
    }
}
