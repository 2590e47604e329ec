//! One auth token bound to one connection manager.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::stores::{PendingConfirmation, SecurityAlert};
use crate::subscription::Subscription;
use crate::ws::{ConnectionManager, ConnectionState};

/// Session facade: connects when a token shows up and tears everything down
/// when it goes away or changes.
#[derive(Clone)]
pub struct Session {
    manager: ConnectionManager,
    token: Arc<Mutex<Option<String>>>,
}

fn lock(token: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// Session over a default [`ConnectionManager`]. Must be called inside a
    /// tokio runtime.
    pub fn spawn(config: SessionConfig) -> Self {
        Self::new(ConnectionManager::spawn(config))
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    /// Bind a new token, or none. An unchanged token does nothing; otherwise
    /// the old session is disconnected, its alerts dropped, and a new one is
    /// opened if there is a token.
    pub fn set_token(&self, token: Option<String>) -> Result<(), SessionError> {
        let token = token.filter(|t| !t.trim().is_empty());
        // Held until the commands are queued, so concurrent callers reach the
        // session task in the same order they swapped the token.
        let mut current = lock(&self.token);
        if *current == token {
            return Ok(());
        }
        current.clone_from(&token);

        tracing::info!(has_token = token.is_some(), "session token changed");
        self.manager.disconnect()?;
        self.manager.clear_alerts()?;
        if let Some(token) = token {
            self.manager.connect(token)?;
        }
        Ok(())
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.set_token(None)
    }

    /// Apply the current value of `tokens` and every later change.
    ///
    /// The task holds a clone of this session, so the session stays alive
    /// until the token source is dropped or the session shuts down.
    pub fn follow(&self, mut tokens: watch::Receiver<Option<String>>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                let token = tokens.borrow_and_update().clone();
                if let Err(e) = session.set_token(token) {
                    tracing::debug!(error = %e, "session gone, no longer following token changes");
                    break;
                }
                if tokens.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    pub fn reconnect(&self) -> Result<(), SessionError> {
        self.manager.reconnect()
    }

    pub async fn respond(&self, confirmed: bool) -> Result<(), SessionError> {
        self.manager.respond(confirmed).await
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.watch_state()
    }

    pub fn on_state_change(
        &self,
        handler: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.manager.on_state_change(handler)
    }

    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        self.manager.pending_confirmation()
    }

    pub fn watch_confirmation(&self) -> watch::Receiver<Option<PendingConfirmation>> {
        self.manager.watch_confirmation()
    }

    pub fn security_alerts(&self) -> Vec<SecurityAlert> {
        self.manager.security_alerts()
    }

    pub fn watch_alerts(&self) -> watch::Receiver<Vec<SecurityAlert>> {
        self.manager.watch_alerts()
    }

    pub fn dismiss_alert(&self, id: Uuid) -> Result<(), SessionError> {
        self.manager.dismiss_alert(id)
    }

    pub fn dismiss_alert_at(&self, index: usize) -> Result<(), SessionError> {
        self.manager.dismiss_alert_at(index)
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.manager.shutdown()
    }
}
