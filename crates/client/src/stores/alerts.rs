//! Security alerts waiting to be shown and dismissed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAlert {
    /// Identity used for dismissal; two alerts with the same text stay distinct.
    pub id: Uuid,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// Insertion-ordered alert queue. No length cap: trimming is up to the
/// display layer.
#[derive(Debug, Default)]
pub(crate) struct AlertQueue {
    alerts: Vec<SecurityAlert>,
}

impl AlertQueue {
    /// Append an alert. Blank messages are ignored.
    pub fn push(&mut self, message: &str) -> Option<SecurityAlert> {
        if message.trim().is_empty() {
            return None;
        }
        let alert = SecurityAlert {
            id: Uuid::new_v4(),
            message: message.to_string(),
            received_at: Utc::now(),
        };
        self.alerts.push(alert.clone());
        Some(alert)
    }

    pub fn dismiss(&mut self, id: Uuid) -> Option<SecurityAlert> {
        let index = self.alerts.iter().position(|alert| alert.id == id)?;
        Some(self.alerts.remove(index))
    }

    pub fn dismiss_at(&mut self, index: usize) -> Option<SecurityAlert> {
        (index < self.alerts.len()).then(|| self.alerts.remove(index))
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.alerts.len();
        self.alerts.clear();
        dropped
    }

    pub fn snapshot(&self) -> Vec<SecurityAlert> {
        self.alerts.clone()
    }
}
