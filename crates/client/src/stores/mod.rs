//! State written by the session task and read by the UI.
//!
//! The session task is the only writer. Readers get snapshots or
//! `tokio::sync::watch` receivers from [`ConnectionManager`](crate::ws::ConnectionManager).

pub mod alerts;
pub mod confirmation;

pub use alerts::SecurityAlert;
pub use confirmation::{ConfirmationOutcome, PendingConfirmation};

pub(crate) use alerts::AlertQueue;
pub(crate) use confirmation::ConfirmationTracker;
