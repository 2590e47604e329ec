//! Handle to a session's connection.
//!
//! The session task writes to three stores (connection state, pending
//! confirmation, alert queue); callers read them through the handle instead
//! of listening for events. Transitions and raw envelopes are additionally
//! multicast to registered handlers.

use std::sync::Arc;

use surveilx_shared::Envelope;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::actor::{Command, Publishers, SessionActor};
use super::connection::{ConnectionState, Connector, TungsteniteConnector};
use super::dispatcher::Dispatcher;
use crate::audio::{AudioCue, Silent};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::notify::{LogSink, NotificationSink};
use crate::stores::{PendingConfirmation, SecurityAlert};
use crate::subscription::{Subscribers, Subscription};

/// Builder for [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn NotificationSink>,
    audio: Arc<dyn AudioCue>,
}

impl ConnectionManagerBuilder {
    /// Transport used to open sockets. Defaults to [`TungsteniteConnector`].
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Where prompts, outcomes, alerts and transitions are reported.
    /// Defaults to [`LogSink`].
    pub fn notification_sink(mut self, sink: impl NotificationSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Cue played for every new exit confirmation. Defaults to [`Silent`].
    pub fn audio_cue(mut self, audio: impl AudioCue) -> Self {
        self.audio = Arc::new(audio);
        self
    }

    /// Spawn the session task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> ConnectionManager {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (confirmation_tx, confirmation) = watch::channel(None);
        let (alerts_tx, alerts) = watch::channel(Vec::new());
        let state_subscribers = Subscribers::new();
        let message_subscribers = Subscribers::new();

        let actor = SessionActor::new(
            self.config,
            self.connector,
            self.sink,
            self.audio,
            commands_rx,
            Dispatcher::new(message_subscribers.clone()),
            Publishers {
                state: state_tx,
                confirmation: confirmation_tx,
                alerts: alerts_tx,
                state_subscribers: state_subscribers.clone(),
            },
        );
        tokio::spawn(actor.run());

        ConnectionManager {
            commands,
            state,
            confirmation,
            alerts,
            state_subscribers,
            message_subscribers,
        }
    }
}

/// Cloneable handle to one session task.
///
/// Commands are queued and applied in order by the task. Dropping the last
/// handle closes the socket and stops the task, same as [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    confirmation: watch::Receiver<Option<PendingConfirmation>>,
    alerts: watch::Receiver<Vec<SecurityAlert>>,
    state_subscribers: Subscribers<ConnectionState>,
    message_subscribers: Subscribers<Envelope>,
}

impl ConnectionManager {
    pub fn builder(config: SessionConfig) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            config,
            connector: Arc::new(TungsteniteConnector),
            sink: Arc::new(LogSink),
            audio: Arc::new(Silent),
        }
    }

    /// Spawn a session with the default transport, sink and audio cue.
    pub fn spawn(config: SessionConfig) -> Self {
        Self::builder(config).spawn()
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Stopped)
    }

    /// Open a session for `token`. An empty token is ignored; the same token
    /// while already connected is a no-op.
    pub fn connect(&self, token: impl Into<String>) -> Result<(), SessionError> {
        self.send(Command::Connect {
            token: token.into(),
        })
    }

    /// Close the socket and stop reconnecting. Drops the pending
    /// confirmation and forgets the token.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.send(Command::Disconnect)
    }

    /// Tear down and dial again with the last token, starting the backoff
    /// over. Also the way out of [`ConnectionState::Error`].
    pub fn reconnect(&self) -> Result<(), SessionError> {
        self.send(Command::Reconnect)
    }

    /// Stop the session task.
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown)
    }

    /// Resolves once the session task has exited.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Call `handler` with the current state now and on every transition.
    pub fn on_state_change(
        &self,
        handler: impl Fn(&ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let handler = Arc::new(handler);
        let forward = handler.clone();
        let subscription = self.state_subscribers.subscribe(move |state| forward(state));
        handler(&self.state());
        subscription
    }

    /// Call `handler` with every decoded inbound envelope.
    pub fn on_message(
        &self,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Subscription {
        self.message_subscribers.subscribe(handler)
    }

    pub fn pending_confirmation(&self) -> Option<PendingConfirmation> {
        self.confirmation.borrow().clone()
    }

    pub fn watch_confirmation(&self) -> watch::Receiver<Option<PendingConfirmation>> {
        self.confirmation.clone()
    }

    /// Answer the open exit confirmation.
    ///
    /// Fails with [`SessionError::NothingPending`] when no challenge is open,
    /// and with [`SessionError::NotConnected`] when the socket is down; in the
    /// latter case the challenge stays open until it expires.
    pub async fn respond(&self, confirmed: bool) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Respond { confirmed, reply })?;
        response.await.map_err(|_| SessionError::Stopped)?
    }

    pub fn security_alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.borrow().clone()
    }

    pub fn watch_alerts(&self) -> watch::Receiver<Vec<SecurityAlert>> {
        self.alerts.clone()
    }

    pub fn dismiss_alert(&self, id: Uuid) -> Result<(), SessionError> {
        self.send(Command::DismissAlert(id))
    }

    pub fn dismiss_alert_at(&self, index: usize) -> Result<(), SessionError> {
        self.send(Command::DismissAlertAt(index))
    }

    pub fn clear_alerts(&self) -> Result<(), SessionError> {
        self.send(Command::ClearAlerts)
    }
}
