mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{settle, Harness};
use surveilx_client::ws::OutboundFrame;
use surveilx_client::ConnectionState;
use surveilx_shared::{Envelope, CLOSE_ABNORMAL, CLOSE_NORMAL, USER_DISCONNECT_REASON};
use tokio::time::Instant;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::test(start_paused = true)]
async fn connect_dials_with_token_in_query() {
    let mut h = Harness::new();
    h.manager.connect("abc.123").unwrap();

    let dial = h.next_dial().await;
    assert_eq!(dial.url.as_str(), "ws://localhost:8080/ws?token=abc.123");
    assert_eq!(h.manager.state(), ConnectionState::Connecting);

    let _socket = dial.accept();
    h.wait_for(ConnectionState::Connected).await;
    assert!(h.manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn empty_token_is_ignored() {
    let mut h = Harness::new();
    h.manager.connect("").unwrap();
    h.manager.connect("   ").unwrap();

    assert!(h.dial_within(secs(5)).await.is_none());
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn same_token_while_connected_is_a_no_op() {
    let mut h = Harness::new();
    let mut socket = h.connected("tok").await;

    h.manager.connect("tok").unwrap();
    assert!(h.dial_within(secs(5)).await.is_none());
    assert!(socket.drain().is_empty());
    assert_eq!(h.manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn new_token_replaces_the_socket() {
    let mut h = Harness::new();
    let mut old = h.connected("first").await;

    h.manager.connect("second").unwrap();
    let dial = h.next_dial().await;
    assert_eq!(dial.token().as_deref(), Some("second"));
    assert_eq!(
        old.next_frame().await,
        Some(OutboundFrame::Close {
            code: CLOSE_NORMAL,
            reason: USER_DISCONNECT_REASON.to_string()
        })
    );
    assert_eq!(old.next_frame().await, None);

    let _socket = dial.accept();
    h.wait_for(ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn superseded_dial_is_closed_when_it_completes() {
    let mut h = Harness::new();
    h.manager.connect("first").unwrap();
    let stale = h.next_dial().await;
    h.manager.connect("second").unwrap();
    let current = h.next_dial().await;

    let mut stale_socket = stale.accept();
    assert!(matches!(
        stale_socket.next_frame().await,
        Some(OutboundFrame::Close { .. })
    ));
    settle().await;
    assert_eq!(h.manager.state(), ConnectionState::Connecting);

    let _socket = current.accept();
    h.wait_for(ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn abnormal_close_retries_with_exponential_backoff() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;

    socket.close(Some(CLOSE_ABNORMAL), "");
    let mut last = Instant::now();
    let mut waits = Vec::new();
    for _ in 0..7 {
        let dial = h.next_dial().await;
        assert_eq!(h.manager.state(), ConnectionState::Connecting);
        assert_eq!(dial.token().as_deref(), Some("tok"));
        waits.push(dial.at - last);
        last = dial.at;
        dial.refuse();
        h.wait_for(ConnectionState::Disconnected).await;
    }

    assert_eq!(
        waits,
        vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30), secs(30)]
    );
}

#[tokio::test(start_paused = true)]
async fn stream_ending_without_close_frame_reconnects() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;
    let dropped_at = Instant::now();
    drop(socket);

    let dial = h.next_dial().await;
    assert_eq!(dial.at - dropped_at, secs(1));
}

#[tokio::test(start_paused = true)]
async fn successful_reconnect_resets_the_backoff() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;
    socket.close(None, "reset by peer");
    h.next_dial().await.refuse();
    h.next_dial().await.refuse();
    let socket = h.next_dial().await.accept();
    h.wait_for(ConnectionState::Connected).await;

    let dropped_at = Instant::now();
    socket.close(Some(1011), "server error");
    let dial = h.next_dial().await;
    assert_eq!(dial.at - dropped_at, secs(1));
}

#[tokio::test(start_paused = true)]
async fn ten_failed_retries_end_in_error() {
    let mut h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let _sub = h
        .manager
        .on_state_change(move |state| record.lock().unwrap().push(*state));

    let socket = h.connected("tok").await;
    socket.close(Some(CLOSE_ABNORMAL), "");
    for _ in 0..10 {
        h.next_dial().await.refuse();
    }

    h.wait_for(ConnectionState::Error).await;
    assert!(h.dial_within(secs(600)).await.is_none());
    assert_eq!(h.manager.state(), ConnectionState::Error);
    assert_eq!(seen.lock().unwrap().last(), Some(&ConnectionState::Error));
}

#[tokio::test(start_paused = true)]
async fn reconnect_leaves_the_error_state() {
    let mut config = surveilx_client::SessionConfig::default();
    config.reconnect.max_attempts = 1;
    let mut h = Harness::with_config(config);

    let socket = h.connected("tok").await;
    socket.close(Some(CLOSE_ABNORMAL), "");
    h.next_dial().await.refuse();
    h.wait_for(ConnectionState::Error).await;

    let asked_at = Instant::now();
    h.manager.reconnect().unwrap();
    let dial = h.next_dial().await;
    assert_eq!(dial.at - asked_at, Duration::from_millis(100));
    assert_eq!(dial.token().as_deref(), Some("tok"));
    let _socket = dial.accept();
    h.wait_for(ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn connect_leaves_the_error_state_with_a_fresh_backoff() {
    let mut config = surveilx_client::SessionConfig::default();
    config.reconnect.max_attempts = 1;
    let mut h = Harness::with_config(config);

    let socket = h.connected("tok").await;
    socket.close(Some(CLOSE_ABNORMAL), "");
    h.next_dial().await.refuse();
    h.wait_for(ConnectionState::Error).await;

    let asked_at = Instant::now();
    h.manager.connect("tok").unwrap();
    let dial = h.next_dial().await;
    assert_eq!(dial.at, asked_at);
    assert_eq!(dial.token().as_deref(), Some("tok"));
    assert_eq!(h.manager.state(), ConnectionState::Connecting);

    let refused_at = Instant::now();
    dial.refuse();
    h.wait_for(ConnectionState::Disconnected).await;
    let retry = h.next_dial().await;
    assert_eq!(retry.at - refused_at, secs(1));

    retry.refuse();
    h.wait_for(ConnectionState::Error).await;
}

#[tokio::test(start_paused = true)]
async fn clean_server_close_does_not_reconnect() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;

    socket.close(Some(CLOSE_NORMAL), "server restart");
    h.wait_for(ConnectionState::Disconnected).await;
    assert!(h.dial_within(secs(120)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_a_pending_retry() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;

    socket.close(Some(CLOSE_ABNORMAL), "");
    h.wait_for(ConnectionState::Disconnected).await;
    h.manager.disconnect().unwrap();

    assert!(h.dial_within(secs(120)).await.is_none());
    assert_eq!(h.manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_closes_then_redials_after_settle() {
    let mut h = Harness::new();
    let mut socket = h.connected("tok").await;

    let asked_at = Instant::now();
    h.manager.reconnect().unwrap();
    assert!(matches!(
        socket.next_frame().await,
        Some(OutboundFrame::Close { code: CLOSE_NORMAL, .. })
    ));

    let dial = h.next_dial().await;
    assert_eq!(dial.at - asked_at, Duration::from_millis(100));
    assert_eq!(dial.token().as_deref(), Some("tok"));
}

#[tokio::test(start_paused = true)]
async fn reconnect_without_token_is_ignored() {
    let mut h = Harness::new();
    h.manager.reconnect().unwrap();
    assert!(h.dial_within(secs(5)).await.is_none());

    let _socket = h.connected("tok").await;
    h.manager.disconnect().unwrap();
    h.manager.reconnect().unwrap();
    assert!(h.dial_within(secs(5)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_every_thirty_seconds_while_connected() {
    let mut h = Harness::new();
    let mut socket = h.connected("tok").await;
    let connected_at = Instant::now();

    assert_eq!(socket.next_envelope().await, Some(Envelope::Ping));
    assert_eq!(connected_at.elapsed(), secs(30));
    assert_eq!(socket.next_envelope().await, Some(Envelope::Ping));
    assert_eq!(connected_at.elapsed(), secs(60));

    h.manager.disconnect().unwrap();
    assert!(matches!(
        socket.next_frame().await,
        Some(OutboundFrame::Close { .. })
    ));
    assert_eq!(socket.next_frame().await, None);
}

#[tokio::test(start_paused = true)]
async fn no_heartbeat_while_reconnecting() {
    let mut h = Harness::new();
    let socket = h.connected("tok").await;
    tokio::time::sleep(secs(20)).await;

    socket.close(Some(CLOSE_ABNORMAL), "");
    let dial = h.next_dial().await;
    tokio::time::sleep(secs(45)).await;
    let mut socket = dial.accept();
    h.wait_for(ConnectionState::Connected).await;

    // The schedule restarts from the new connection
    let connected_at = Instant::now();
    assert_eq!(socket.next_envelope().await, Some(Envelope::Ping));
    assert_eq!(connected_at.elapsed(), secs(30));
}

#[tokio::test(start_paused = true)]
async fn state_handler_sees_current_state_then_every_transition() {
    let mut h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let sub = h
        .manager
        .on_state_change(move |state| record.lock().unwrap().push(*state));
    assert_eq!(*seen.lock().unwrap(), vec![ConnectionState::Disconnected]);

    let socket = h.connected("tok").await;
    socket.close(Some(CLOSE_NORMAL), "");
    h.wait_for(ConnectionState::Disconnected).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );

    sub.unsubscribe();
    let _socket = h.connected("tok").await;
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn raw_stream_subscribers_get_every_decoded_envelope() {
    let mut h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let _sub = h
        .manager
        .on_message(move |envelope| record.lock().unwrap().push(envelope.kind()));
    let _panicky = h.manager.on_message(|_| panic!("handler bug"));

    let socket = h.connected("tok").await;
    socket.send(&Envelope::ConnectionAck);
    socket.send_raw("not json");
    socket.send_raw(r#"{"type":"mystery"}"#);
    socket.send(&Envelope::Pong);
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["connection_ack", "pong"]);
    assert_eq!(h.manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_the_socket_and_stops_the_task() {
    let mut h = Harness::new();
    let mut socket = h.connected("tok").await;

    h.manager.shutdown().unwrap();
    h.manager.closed().await;

    assert!(matches!(
        socket.next_frame().await,
        Some(OutboundFrame::Close { code: CLOSE_NORMAL, .. })
    ));
    assert!(h.manager.connect("tok").is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_last_handle_closes_the_socket() {
    let mut h = Harness::new();
    let mut socket = h.connected("tok").await;

    drop(h.manager);
    assert!(matches!(
        socket.next_frame().await,
        Some(OutboundFrame::Close { .. })
    ));
    assert_eq!(socket.next_frame().await, None);
}
