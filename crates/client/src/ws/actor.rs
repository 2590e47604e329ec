//! The session task.
//!
//! One task per session owns the socket link, the three timers, the pending
//! confirmation and the alert queue. Handles talk to it over [`Command`]s;
//! everything else it needs to react to (socket events, dial results, timer
//! expiry) is polled from the same `select!`, so session state is never shared.

use std::sync::Arc;

use surveilx_shared::Envelope;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use super::backoff::ReconnectState;
use super::connection::{
    redact_token, session_url, CloseInfo, ConnectionState, Connector, Link, OutboundFrame,
    SocketEvent,
};
use super::dispatcher::{Dispatcher, Route};
use super::heartbeat::Heartbeat;
use super::timer::Deadline;
use crate::audio::AudioCue;
use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::notify::NotificationSink;
use crate::stores::{
    AlertQueue, ConfirmationOutcome, ConfirmationTracker, PendingConfirmation, SecurityAlert,
};
use crate::subscription::Subscribers;

pub(crate) enum Command {
    Connect { token: String },
    Disconnect,
    Reconnect,
    Respond {
        confirmed: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    DismissAlert(Uuid),
    DismissAlertAt(usize),
    ClearAlerts,
    Shutdown,
}

/// Outcome of a dial task, tagged with the generation that started it.
struct DialResult {
    generation: u64,
    result: Result<Link, TransportError>,
}

enum Event {
    Command(Option<Command>),
    Dialed(DialResult),
    Socket(SocketEvent),
    HeartbeatDue,
    ReconnectDue,
    ConfirmationExpired,
}

/// Write ends of the stores the handles read.
pub(crate) struct Publishers {
    pub state: watch::Sender<ConnectionState>,
    pub confirmation: watch::Sender<Option<PendingConfirmation>>,
    pub alerts: watch::Sender<Vec<SecurityAlert>>,
    pub state_subscribers: Subscribers<ConnectionState>,
}

pub(crate) struct SessionActor {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn NotificationSink>,
    audio: Arc<dyn AudioCue>,
    commands: mpsc::UnboundedReceiver<Command>,
    dial_tx: mpsc::UnboundedSender<DialResult>,
    dial_rx: mpsc::UnboundedReceiver<DialResult>,
    /// Bumped on every dial and every teardown; older dial results are stale.
    generation: u64,
    link: Option<Link>,
    token: Option<String>,
    should_reconnect: bool,
    retry: ReconnectState,
    heartbeat: Heartbeat,
    /// Backoff retry or manual-reconnect settle; either way it ends in a dial.
    reconnect: Deadline,
    confirmation: ConfirmationTracker,
    alerts: AlertQueue,
    dispatcher: Dispatcher,
    publishers: Publishers,
    state: ConnectionState,
    last_pong: Option<Instant>,
}

impl SessionActor {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn NotificationSink>,
        audio: Arc<dyn AudioCue>,
        commands: mpsc::UnboundedReceiver<Command>,
        dispatcher: Dispatcher,
        publishers: Publishers,
    ) -> Self {
        let (dial_tx, dial_rx) = mpsc::unbounded_channel();
        Self {
            heartbeat: Heartbeat::new(config.heartbeat_interval),
            confirmation: ConfirmationTracker::new(config.confirmation_timeout),
            config,
            connector,
            sink,
            audio,
            commands,
            dial_tx,
            dial_rx,
            generation: 0,
            link: None,
            token: None,
            should_reconnect: false,
            retry: ReconnectState::default(),
            reconnect: Deadline::default(),
            alerts: AlertQueue::default(),
            dispatcher,
            publishers,
            state: ConnectionState::Disconnected,
            last_pong: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => Event::Command(command),
                Some(dialed) = self.dial_rx.recv() => Event::Dialed(dialed),
                socket = next_socket_event(&mut self.link) => Event::Socket(socket),
                _ = self.heartbeat.tick() => Event::HeartbeatDue,
                _ = self.reconnect.elapsed() => Event::ReconnectDue,
                _ = self.confirmation.expired() => Event::ConfirmationExpired,
            };

            match event {
                Event::Command(Some(Command::Shutdown)) | Event::Command(None) => break,
                Event::Command(Some(command)) => self.handle_command(command),
                Event::Dialed(dialed) => self.handle_dialed(dialed),
                Event::Socket(socket) => self.handle_socket(socket),
                Event::HeartbeatDue => self.beat(),
                Event::ReconnectDue => {
                    self.reconnect.cancel();
                    self.open();
                }
                Event::ConfirmationExpired => self.expire_confirmation(),
            }
        }

        self.disconnect();
        tracing::debug!("session task stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { token } => self.connect(token),
            Command::Disconnect => self.disconnect(),
            Command::Reconnect => self.manual_reconnect(),
            Command::Respond { confirmed, reply } => {
                let _ = reply.send(self.respond(confirmed));
            }
            Command::DismissAlert(id) => {
                if self.alerts.dismiss(id).is_some() {
                    self.publish_alerts();
                }
            }
            Command::DismissAlertAt(index) => {
                if self.alerts.dismiss_at(index).is_some() {
                    self.publish_alerts();
                }
            }
            Command::ClearAlerts => {
                if self.alerts.clear() > 0 {
                    self.publish_alerts();
                }
            }
            // Handled by the loop
            Command::Shutdown => {}
        }
    }

    fn connect(&mut self, token: String) {
        if token.trim().is_empty() {
            tracing::warn!("connect called without a token, ignoring");
            return;
        }
        if self.state.is_connected() && self.token.as_deref() == Some(token.as_str()) {
            tracing::debug!("already connected with this token");
            return;
        }

        self.teardown();
        self.token = Some(token);
        self.should_reconnect = true;
        self.retry.reset();
        self.open();
    }

    fn disconnect(&mut self) {
        self.should_reconnect = false;
        self.discard_confirmation();
        self.teardown();
        self.token = None;
        self.set_state(ConnectionState::Disconnected);
    }

    fn manual_reconnect(&mut self) {
        let Some(token) = self.token.clone() else {
            tracing::info!("reconnect requested without a stored token, ignoring");
            return;
        };
        tracing::info!(settle = ?self.config.reconnect_settle, "manual reconnect");
        self.disconnect();
        self.token = Some(token);
        self.should_reconnect = true;
        self.retry.reset();
        self.reconnect.arm(self.config.reconnect_settle);
    }

    /// Cancel every timer, invalidate in-flight dials and close the socket.
    fn teardown(&mut self) {
        self.heartbeat.stop();
        self.reconnect.cancel();
        self.generation += 1;
        if let Some(link) = self.link.take() {
            link.close();
        }
    }

    /// Start a dial for the stored token.
    fn open(&mut self) {
        let Some(token) = self.token.clone() else {
            tracing::debug!("no token to dial with");
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.set_state(ConnectionState::Connecting);

        let url = match session_url(&self.config.ws_url, &token) {
            Ok(url) => url,
            Err(e) => {
                self.dial_failed(e);
                return;
            }
        };
        tracing::info!(url = %redact_token(&url), attempt = self.retry.attempt, "connecting");

        let connector = self.connector.clone();
        let results = self.dial_tx.clone();
        tokio::spawn(dial(connector, url, generation, results));
    }

    fn handle_dialed(&mut self, dialed: DialResult) {
        if dialed.generation != self.generation {
            if let Ok(link) = dialed.result {
                tracing::debug!("dropping socket from a superseded dial");
                link.close();
            }
            return;
        }

        match dialed.result {
            Ok(link) => {
                self.link = Some(link);
                self.retry.reset();
                self.heartbeat.start();
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => self.dial_failed(e),
        }
    }

    fn dial_failed(&mut self, error: TransportError) {
        tracing::warn!(error = %error, "connection attempt failed");
        self.schedule_retry();
    }

    fn handle_socket(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Text(frame) => {
                if let Some(route) = self.dispatcher.dispatch(&frame) {
                    self.route(route);
                }
            }
            SocketEvent::Closed(close) => self.closed(close),
        }
    }

    fn closed(&mut self, close: CloseInfo) {
        self.link = None;
        self.heartbeat.stop();

        if close.is_clean() {
            tracing::info!(reason = %close.reason, "connection closed");
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        tracing::warn!(code = ?close.code, reason = %close.reason, "connection lost");
        self.schedule_retry();
    }

    /// After an unclean close: wait out the next backoff delay, or give up.
    fn schedule_retry(&mut self) {
        self.heartbeat.stop();
        if !self.should_reconnect || self.token.is_none() {
            self.set_state(ConnectionState::Disconnected);
            return;
        }

        match self.retry.next_delay(&self.config.reconnect) {
            Some(delay) => {
                tracing::info!(
                    attempt = self.retry.attempt,
                    max_attempts = self.config.reconnect.max_attempts,
                    delay = ?delay,
                    "scheduling reconnect"
                );
                self.reconnect.arm(delay);
                self.set_state(ConnectionState::Disconnected);
            }
            None => {
                tracing::error!(
                    attempts = self.retry.attempt,
                    "reconnect attempts exhausted, giving up"
                );
                self.reconnect.cancel();
                self.set_state(ConnectionState::Error);
            }
        }
    }

    fn route(&mut self, route: Route) {
        match route {
            Route::Ack => tracing::debug!("connection acknowledged"),
            Route::Pong => {
                self.last_pong = Some(Instant::now());
                tracing::debug!("pong");
            }
            Route::Confirmation(challenge) => {
                if let Some(replaced) = self.confirmation.begin(challenge) {
                    tracing::info!(
                        pending_id = %replaced.pending_id,
                        "exit confirmation replaced by a newer challenge"
                    );
                    self.sink
                        .confirmation_closed(&replaced.pending_id, ConfirmationOutcome::Superseded);
                }
                if let Some(pending) = self.confirmation.pending() {
                    tracing::info!(pending_id = %pending.pending_id, "exit confirmation requested");
                    self.sink.confirmation_requested(pending);
                }
                self.publish_confirmation();
                self.audio.play();
            }
            Route::Alert(Some(message)) => {
                if let Some(alert) = self.alerts.push(&message) {
                    tracing::info!(id = %alert.id, "security alert received");
                    self.sink.security_alert(&alert);
                    self.publish_alerts();
                }
            }
            Route::Alert(None) => tracing::debug!("security alert without a message, ignoring"),
            Route::Unexpected(kind) => tracing::warn!(kind, "server sent a client-only message"),
        }
    }

    fn respond(&mut self, confirmed: bool) -> Result<(), SessionError> {
        let Some(pending) = self.confirmation.pending() else {
            return Err(SessionError::NothingPending);
        };
        let frame = pending.response(confirmed).encode()?;
        let sent = self
            .link
            .as_ref()
            .is_some_and(|link| link.send(OutboundFrame::Text(frame)));
        if !sent {
            tracing::warn!(pending_id = %pending.pending_id, "cannot answer exit confirmation while disconnected");
            return Err(SessionError::NotConnected);
        }

        if let Some(answered) = self.confirmation.clear() {
            tracing::info!(pending_id = %answered.pending_id, confirmed, "exit confirmation answered");
            self.sink
                .confirmation_closed(&answered.pending_id, ConfirmationOutcome::answered(confirmed));
        }
        self.publish_confirmation();
        Ok(())
    }

    fn expire_confirmation(&mut self) {
        if let Some(expired) = self.confirmation.clear() {
            tracing::info!(pending_id = %expired.pending_id, "exit confirmation expired unanswered");
            self.sink
                .confirmation_closed(&expired.pending_id, ConfirmationOutcome::Expired);
            self.publish_confirmation();
        }
    }

    fn discard_confirmation(&mut self) {
        if let Some(discarded) = self.confirmation.clear() {
            self.sink
                .confirmation_closed(&discarded.pending_id, ConfirmationOutcome::Discarded);
            self.publish_confirmation();
        }
    }

    fn beat(&mut self) {
        self.heartbeat.advance();
        let Some(link) = self.link.as_ref().filter(|link| link.is_writable()) else {
            tracing::debug!("socket not writable, skipping heartbeat");
            return;
        };
        match Envelope::Ping.encode() {
            Ok(ping) => {
                link.send(OutboundFrame::Text(ping));
                tracing::debug!(since_pong = ?self.last_pong.map(|at| at.elapsed()), "ping");
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode ping"),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "connection state");
        self.state = state;
        self.publishers.state.send_replace(state);
        self.publishers.state_subscribers.emit(&state);
        self.sink.connection_state(state);
    }

    fn publish_confirmation(&self) {
        self.publishers
            .confirmation
            .send_replace(self.confirmation.pending().cloned());
    }

    fn publish_alerts(&self) {
        self.publishers.alerts.send_replace(self.alerts.snapshot());
    }
}

async fn next_socket_event(link: &mut Option<Link>) -> SocketEvent {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

async fn dial(
    connector: Arc<dyn Connector>,
    url: Url,
    generation: u64,
    results: mpsc::UnboundedSender<DialResult>,
) {
    let result = connector.connect(&url).await;
    let sent = results.send(DialResult { generation, result });
    if let Err(mpsc::error::SendError(DialResult { result: Ok(link), .. })) = sent {
        // Session task is gone
        link.close();
    }
}
