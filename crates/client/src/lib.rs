//! SurveilX session client
//!
//! Keeps an authenticated WebSocket session with the SurveilX monitoring
//! backend: reconnects with backoff, sends heartbeats, tracks gate exit
//! confirmations and queues security alerts for display.

pub mod audio;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod notify;
pub mod session;
pub mod stores;
pub mod subscription;
pub mod ws;

pub use audio::{AudioCue, Silent, TerminalBell};
pub use config::SessionConfig;
pub use credentials::TokenStore;
pub use error::{SessionError, StorageError, TransportError};
pub use notify::{LogSink, NotificationSink};
pub use session::Session;
pub use stores::{ConfirmationOutcome, PendingConfirmation, SecurityAlert};
pub use subscription::{Subscribers, Subscription};
pub use ws::{ConnectionManager, ConnectionManagerBuilder, ConnectionState};

pub use surveilx_shared as protocol;
