//! One-shot deadlines for the session event loop.
//!
//! The actor polls every timer from a single `tokio::select!`, so a disarmed
//! timer must still be pollable: it simply never completes.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arm (or re-arm) the timer to fire `after` from now.
    pub fn arm(&mut self, after: Duration) -> Instant {
        let at = Instant::now() + after;
        self.at = Some(at);
        at
    }

    pub fn arm_at(&mut self, at: Instant) {
        self.at = Some(at);
    }

    /// Disarm. Cancelling an idle or already-fired timer is a no-op.
    pub fn cancel(&mut self) {
        self.at = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    /// Resolves when the deadline passes; pending forever while disarmed.
    pub async fn elapsed(&self) {
        match self.at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    }
}
