//! Native WebSocket transport using tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::unbounded_channel;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message,
    },
};
use url::Url;

use super::{CloseInfo, Connector, Link, OutboundFrame, SocketEvent};
use crate::error::TransportError;

/// How long a dropped link waits for the peer to finish the close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// Opens real sockets. Each link is served by a read task and a write task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<Link, TransportError> {
        let (ws_stream, _response) = connect_async(url.as_str()).await.map_err(|e| match e {
            WsError::Http(response) => TransportError::Rejected(response.status().as_u16()),
            WsError::Url(e) => TransportError::InvalidUrl {
                url: redact_token(url),
                reason: e.to_string(),
            },
            other => TransportError::Connect(other.to_string()),
        })?;
        tracing::debug!(url = %redact_token(url), "websocket handshake complete");

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = unbounded_channel::<OutboundFrame>();
        let (events_tx, events_rx) = unbounded_channel::<SocketEvent>();

        // Read task
        tokio::spawn(async move {
            let close = loop {
                let next = tokio::select! {
                    next = read.next() => next,
                    () = events_tx.closed() => {
                        // Session dropped this link. Both halves must go for
                        // the socket to close, so stop waiting on a silent peer.
                        let drain = async { while let Some(Ok(_)) = read.next().await {} };
                        if tokio::time::timeout(CLOSE_GRACE, drain).await.is_err() {
                            tracing::debug!("peer never answered the close, dropping the socket");
                        }
                        return;
                    }
                };
                match next {
                    Some(Ok(Message::Text(text))) => {
                        if events_tx.send(SocketEvent::Text(text.as_str().to_owned())).is_err() {
                            // Session dropped this link
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => {
                                CloseInfo::new(Some(u16::from(frame.code)), frame.reason.as_str())
                            }
                            None => CloseInfo::abnormal("close frame without status"),
                        };
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // Pong is handled automatically by tungstenite
                    }
                    Some(Ok(_)) => {
                        // Binary frames are not part of the protocol
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read error");
                        break CloseInfo::abnormal(e.to_string());
                    }
                    None => break CloseInfo::abnormal("stream ended without close frame"),
                }
            };
            let _ = events_tx.send(SocketEvent::Closed(close));
        });

        // Write task
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let result = match frame {
                    OutboundFrame::Text(json) => write.send(Message::Text(json.into())).await,
                    OutboundFrame::Close { code, reason } => {
                        let close = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        let _ = write.send(Message::Close(Some(close))).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    tracing::warn!(error = %e, "websocket send failed");
                    break;
                }
            }
            // Sender dropped or close sent
            let _ = tokio::time::timeout(CLOSE_GRACE, write.close()).await;
        });

        Ok(Link::new(outbound_tx, events_rx))
    }
}

/// The URL minus its credential, for logs.
pub(crate) fn redact_token(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "token" { "***".to_string() } else { value.into_owned() };
            (key.into_owned(), value)
        })
        .collect();
    if pairs.is_empty() {
        return redacted.to_string();
    }
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
