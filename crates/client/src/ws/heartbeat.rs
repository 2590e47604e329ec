//! Outbound liveness ping while the socket is connected.

use std::time::Duration;

use super::timer::Deadline;

/// Fixed-rate ping schedule. Only armed while the connection is `Connected`.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    interval: Duration,
    timer: Deadline,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: Deadline::default(),
        }
    }

    /// Start beating; the first ping is due one interval from now.
    pub fn start(&mut self) {
        self.timer.arm(self.interval);
    }

    pub fn stop(&mut self) {
        self.timer.cancel();
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.timer.is_armed()
    }

    /// Wait for the next beat.
    pub async fn tick(&self) {
        self.timer.elapsed().await
    }

    /// Schedule the beat after the one that just fired, keeping a fixed rate
    /// regardless of how long the send took.
    pub fn advance(&mut self) {
        if let Some(fired_at) = self.timer.at() {
            self.timer.arm_at(fired_at + self.interval);
        }
    }
}
