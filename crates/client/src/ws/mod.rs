//! WebSocket session layer.
//!
//! This module provides:
//! - Connection management with backoff reconnect and heartbeat
//! - Decoding and routing of inbound envelopes
//! - Direct writes to stores (callers read stores, not events)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                ConnectionManager                    │
//! │      (cloneable handle, commands over a channel)    │
//! └─────────────────────────────────────────────────────┘
//!                         │
//!                         ▼
//!              ┌─────────────────────┐      ┌───────────┐
//!              │    SessionActor     │◀────▶│ Connector │
//!              │ (timers, link, FSM) │      │  (Link)   │
//!              └─────────────────────┘      └───────────┘
//!                         │
//!          ┌──────────────┼──────────────┐
//!          ▼              ▼              ▼
//!   ┌────────────┐ ┌────────────┐ ┌────────────┐
//!   │   state    │ │confirmation│ │   alerts   │
//!   │   store    │ │   store    │ │   store    │
//!   └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = ConnectionManager::spawn(SessionConfig::from_env());
//! manager.connect(token)?;
//!
//! let mut prompts = manager.watch_confirmation();
//! while prompts.changed().await.is_ok() {
//!     if let Some(pending) = prompts.borrow().clone() {
//!         println!("{}", pending.message);
//!     }
//! }
//! ```

mod actor;
mod backoff;
mod connection;
mod dispatcher;
mod heartbeat;
mod manager;
pub(crate) mod timer;

pub use backoff::{BackoffPolicy, ReconnectState};
pub use connection::{
    session_url, CloseInfo, ConnectionState, Connector, Link, OutboundFrame, SocketEvent,
    TungsteniteConnector,
};
pub use manager::{ConnectionManager, ConnectionManagerBuilder};
