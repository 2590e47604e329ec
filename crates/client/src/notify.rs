//! UI notification sink.
//!
//! The session task reports everything a UI needs to show through this
//! trait. All methods default to doing nothing, so a sink only implements
//! what it displays.

use crate::stores::{ConfirmationOutcome, PendingConfirmation, SecurityAlert};
use crate::ws::ConnectionState;

pub trait NotificationSink: Send + Sync + 'static {
    fn connection_state(&self, _state: ConnectionState) {}

    /// A new prompt to show until `pending.expires_at`.
    fn confirmation_requested(&self, _pending: &PendingConfirmation) {}

    /// The prompt with `pending_id` should be taken down.
    fn confirmation_closed(&self, _pending_id: &str, _outcome: ConfirmationOutcome) {}

    fn security_alert(&self, _alert: &SecurityAlert) {}
}

/// Sink that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn connection_state(&self, state: ConnectionState) {
        tracing::info!(%state, "connection state changed");
    }

    fn confirmation_requested(&self, pending: &PendingConfirmation) {
        tracing::info!(
            pending_id = %pending.pending_id,
            plate = pending.plate_number.as_deref().unwrap_or("-"),
            expires_at = %pending.expires_at,
            "exit confirmation requested: {}",
            pending.message
        );
    }

    fn confirmation_closed(&self, pending_id: &str, outcome: ConfirmationOutcome) {
        tracing::info!(pending_id, ?outcome, "exit confirmation closed");
    }

    fn security_alert(&self, alert: &SecurityAlert) {
        tracing::warn!(alert_id = %alert.id, "security alert: {}", alert.message);
    }
}
