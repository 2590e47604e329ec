//! Scripted transport for driving a session in tests.
#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use surveilx_client::ws::{CloseInfo, Connector, Link, OutboundFrame, SocketEvent};
use surveilx_client::{
    ConnectionManager, ConnectionManagerBuilder, ConnectionState, SessionConfig, TransportError,
};
use surveilx_shared::Envelope;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use url::Url;

/// A dial waiting for the test to accept or refuse it.
pub struct Dial {
    pub url: Url,
    pub at: Instant,
    reply: oneshot::Sender<Result<Link, TransportError>>,
}

impl Dial {
    pub fn token(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }

    pub fn accept(self) -> MockSocket {
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let (inbound, events_rx) = mpsc::unbounded_channel();
        let _ = self.reply.send(Ok(Link::new(outbound_tx, events_rx)));
        MockSocket { inbound, outbound }
    }

    pub fn refuse(self) {
        let _ = self
            .reply
            .send(Err(TransportError::Connect("connection refused".into())));
    }
}

/// Server end of an accepted dial.
pub struct MockSocket {
    inbound: mpsc::UnboundedSender<SocketEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl MockSocket {
    pub fn send(&self, envelope: &Envelope) {
        self.send_raw(&envelope.encode().unwrap());
    }

    pub fn send_raw(&self, frame: &str) {
        let _ = self.inbound.send(SocketEvent::Text(frame.to_string()));
    }

    pub fn close(&self, code: Option<u16>, reason: &str) {
        let _ = self
            .inbound
            .send(SocketEvent::Closed(CloseInfo::new(code, reason)));
    }

    /// Next frame the client wrote, `None` once the client dropped the link.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }

    /// Next frame the client wrote, decoded. Panics on a close frame.
    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        match self.next_frame().await? {
            OutboundFrame::Text(json) => Some(Envelope::decode(&json).unwrap()),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    /// Frames already written, without waiting.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }
}

#[derive(Clone)]
pub struct MockConnector {
    dials: mpsc::UnboundedSender<Dial>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Link, TransportError> {
        let (reply, response) = oneshot::channel();
        let dial = Dial {
            url: url.clone(),
            at: Instant::now(),
            reply,
        };
        if self.dials.send(dial).is_err() {
            return Err(TransportError::Connect("test harness gone".into()));
        }
        response
            .await
            .unwrap_or_else(|_| Err(TransportError::Connect("dial dropped".into())))
    }
}

pub struct Harness {
    pub manager: ConnectionManager,
    pub dials: mpsc::UnboundedReceiver<Dial>,
    pub states: watch::Receiver<ConnectionState>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_builder(config, |builder| builder)
    }

    /// Harness whose builder is customized (sink, audio) before spawning.
    pub fn with_builder(
        config: SessionConfig,
        customize: impl FnOnce(ConnectionManagerBuilder) -> ConnectionManagerBuilder,
    ) -> Self {
        let (dials_tx, dials) = mpsc::unbounded_channel();
        let builder = ConnectionManager::builder(config).connector(MockConnector { dials: dials_tx });
        let manager = customize(builder).spawn();
        let states = manager.watch_state();
        Self {
            manager,
            dials,
            states,
        }
    }

    pub async fn next_dial(&mut self) -> Dial {
        self.dials.recv().await.expect("connector dropped")
    }

    /// Connect with `token` and accept the first dial.
    pub async fn connected(&mut self, token: &str) -> MockSocket {
        self.manager.connect(token).unwrap();
        let socket = self.next_dial().await.accept();
        self.wait_for(ConnectionState::Connected).await;
        socket
    }

    pub async fn wait_for(&mut self, state: ConnectionState) {
        self.states
            .wait_for(|current| *current == state)
            .await
            .expect("session task stopped");
    }

    /// Whether a dial shows up within `within`.
    pub async fn dial_within(&mut self, within: Duration) -> Option<Dial> {
        tokio::time::timeout(within, self.dials.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Let the session task process everything queued so far.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn challenge(pending_id: &str, message: Option<&str>) -> Envelope {
    Envelope::ExitConfirmation(surveilx_shared::ExitConfirmation {
        pending_id: pending_id.to_string(),
        token: format!("challenge-{pending_id}"),
        message: message.map(str::to_string),
        plate_number: Some("KDA 123A".to_string()),
        vehicle_name: Some("Toyota Axio".to_string()),
    })
}
