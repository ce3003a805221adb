//! Reconnect loop behavior against the in-memory connector.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use livetable_client::ws::{MockConnector, MockPeers};
use livetable_client::{
    CloseInfo, ConnectionState, Handlers, StaticCredential, TransportConfig, TransportError,
    WsConnection,
};
use parking_lot::Mutex;
use serde_json::{json, Value};

const DELAY: Duration = Duration::from_millis(3000);

fn config() -> TransportConfig {
    TransportConfig::new("ws://livetable.test/api/ws").with_reconnect_delay(DELAY)
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Open,
    Message(Value),
    Close(u16),
    Error(TransportError),
    Dropped(&'static str),
}

fn recording() -> (Handlers<Value>, Arc<Mutex<Vec<Seen>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c, d, e) = (log.clone(), log.clone(), log.clone(), log.clone(), log.clone());
    let handlers = Handlers::new()
        .on_open(move || a.lock().push(Seen::Open))
        .on_message(move |v| b.lock().push(Seen::Message(v)))
        .on_close(move |info: &CloseInfo| c.lock().push(Seen::Close(info.code)))
        .on_error(move |err: &TransportError| d.lock().push(Seen::Error(err.clone())))
        .on_decode_error(move |err| e.lock().push(Seen::Dropped(err.kind())));
    (handlers, log)
}

fn start(handlers: Handlers<Value>) -> (WsConnection<Value>, MockConnector, MockPeers) {
    let (connector, peers) = MockConnector::new();
    let conn = WsConnection::builder(config())
        .handlers(handlers)
        .connector(connector.clone())
        .spawn()
        .unwrap();
    (conn, connector, peers)
}

async fn wait_open(conn: &WsConnection<Value>) {
    let mut state = conn.state_changes();
    state.wait_for(ConnectionState::is_open).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn delivers_decoded_frames_in_order() {
    let (handlers, log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    peer.send_json(&json!({"n": 1}));
    peer.send_json(&json!({"n": 2}));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        *log.lock(),
        vec![
            Seen::Open,
            Seen::Message(json!({"n": 1})),
            Seen::Message(json!({"n": 2})),
        ]
    );
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn reconnects_after_each_close_with_fixed_delay() {
    let (handlers, log) = recording();
    let (conn, connector, mut peers) = start(handlers);

    for _ in 0..3 {
        let peer = peers.next().await.unwrap();
        wait_open(&conn).await;
        peer.close(1001, "going away");
    }
    let _fourth = peers.next().await.unwrap();
    wait_open(&conn).await;

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 4);
    for pair in attempts.windows(2) {
        assert!(pair[1].at - pair[0].at >= DELAY);
    }

    let closes = log
        .lock()
        .iter()
        .filter(|seen| matches!(seen, Seen::Close(1001)))
        .count();
    assert_eq!(closes, 3);
    assert_eq!(conn.stats().opens, 4);
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn dropped_socket_reports_abnormal_close() {
    let (handlers, log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    drop(peer);

    let _again = peers.next().await.unwrap();
    assert!(log.lock().contains(&Seen::Close(CloseInfo::ABNORMAL)));
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn read_error_reports_error_then_close() {
    let (handlers, log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    peer.fail("reset by peer");

    let _again = peers.next().await.unwrap();
    let log = log.lock();
    assert_eq!(log[0], Seen::Open);
    assert!(matches!(log[1], Seen::Error(TransportError::Socket(_))));
    assert_eq!(log[2], Seen::Close(CloseInfo::ABNORMAL));
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn write_half_is_closed_after_server_close_and_read_error() {
    let (handlers, _log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    let closed = peer.client_closed();
    peer.close(1000, "bye");
    let peer = peers.next().await.unwrap();
    assert!(closed.load(Ordering::SeqCst));

    wait_open(&conn).await;
    let closed = peer.client_closed();
    peer.fail("reset by peer");
    let _again = peers.next().await.unwrap();
    assert!(closed.load(Ordering::SeqCst));
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn close_stops_reconnecting() {
    let (handlers, log) = recording();
    let (conn, connector, mut peers) = start(handlers);

    let _peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    conn.close();
    conn.stopped().await;

    tokio::time::sleep(DELAY * 5).await;
    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(conn.state(), ConnectionState::Stopped);
    assert_eq!(
        *log.lock(),
        vec![Seen::Open, Seen::Close(CloseInfo::NORMAL)]
    );
}

#[tokio::test(start_paused = true)]
async fn close_during_backoff_stops() {
    let (handlers, _log) = recording();
    let (conn, connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    peer.close(1000, "");

    let mut state = conn.state_changes();
    state
        .wait_for(|s| matches!(s, ConnectionState::WaitingToReconnect { .. }))
        .await
        .unwrap();
    conn.close();
    conn.stopped().await;

    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(connector.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_dropped_and_counted() {
    let (handlers, log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    peer.send_text("{not json");
    peer.send_binary(vec![0xff, 0xfe]);
    peer.send_json(&json!({"ok": true}));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(
        *log.lock(),
        vec![
            Seen::Open,
            Seen::Dropped("json"),
            Seen::Dropped("utf8"),
            Seen::Message(json!({"ok": true})),
        ]
    );
    let stats = conn.stats();
    assert_eq!(stats.frames_received, 3);
    assert_eq!(stats.frames_dropped, 2);
    assert!(conn.state().is_open());
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn send_writes_only_while_open() {
    let (handlers, _log) = recording();
    let (conn, _connector, mut peers) = start(handlers);

    let mut peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    conn.send(&json!({"type": "ping"})).unwrap();
    assert_eq!(peer.recv_sent().await.unwrap(), r#"{"type":"ping"}"#);

    peer.close(1000, "");
    let mut state = conn.state_changes();
    state.wait_for(|s| !s.is_open()).await.unwrap();

    assert_eq!(conn.send(&json!({"type": "ping"})), Err(TransportError::NotConnected));
    let stats = conn.stats();
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.sends_dropped, 1);
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn send_after_close_is_rejected() {
    let (handlers, _log) = recording();
    let (conn, _connector, _peers) = start(handlers);

    conn.close();
    conn.stopped().await;
    assert_eq!(conn.send("late"), Err(TransportError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn refused_connect_reports_error_close_then_retries() {
    let (handlers, log) = recording();
    let (connector, mut peers) = MockConnector::new();
    connector.refuse_next(1);
    let conn = WsConnection::builder(config())
        .handlers(handlers)
        .connector(connector.clone())
        .spawn()
        .unwrap();

    let _peer = peers.next().await.unwrap();
    wait_open(&conn).await;

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1].at - attempts[0].at >= DELAY);

    let log = log.lock();
    assert!(matches!(log[0], Seen::Error(TransportError::Connect(_))));
    assert_eq!(log[1], Seen::Close(CloseInfo::ABNORMAL));
    assert_eq!(log[2], Seen::Open);
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn stalled_connect_times_out() {
    let (handlers, log) = recording();
    let (connector, mut peers) = MockConnector::new();
    connector.stall_next(1);
    let conn = WsConnection::builder(config().with_connect_timeout(Duration::from_secs(5)))
        .handlers(handlers)
        .connector(connector.clone())
        .spawn()
        .unwrap();

    let _peer = peers.next().await.unwrap();
    assert_eq!(
        log.lock()[0],
        Seen::Error(TransportError::Timeout(Duration::from_secs(5)))
    );
    assert_eq!(connector.attempts().len(), 2);
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn credential_is_appended_on_every_attempt() {
    let (connector, mut peers) = MockConnector::new();
    let conn: WsConnection<Value> = WsConnection::builder(config())
        .connector(connector.clone())
        .credentials(StaticCredential::new("s3cret"))
        .spawn()
        .unwrap();

    let peer = peers.next().await.unwrap();
    peer.close(1000, "");
    let _peer = peers.next().await.unwrap();

    for attempt in connector.attempts() {
        assert_eq!(attempt.url, "ws://livetable.test/api/ws?token=s3cret");
    }
    assert_eq!(conn.url(), "ws://livetable.test/api/ws");
    conn.close();
}

#[tokio::test(start_paused = true)]
async fn missing_credential_waits_without_connecting() {
    let (connector, _peers) = MockConnector::new();
    let conn: WsConnection<Value> = WsConnection::builder(config())
        .connector(connector.clone())
        .credentials(|| None::<String>)
        .spawn()
        .unwrap();

    tokio::time::sleep(DELAY * 3).await;
    assert!(connector.attempts().is_empty());
    assert_eq!(conn.stats().connect_attempts, 0);
    conn.close();
    conn.stopped().await;
}

#[tokio::test]
async fn rejects_non_websocket_urls() {
    let result = WsConnection::<Value>::connect(
        TransportConfig::new("http://livetable.test/api/ws"),
        Handlers::new(),
    );
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_connection_stops_the_driver() {
    let (handlers, log) = recording();
    let (conn, connector, mut peers) = start(handlers);

    let _peer = peers.next().await.unwrap();
    wait_open(&conn).await;
    let mut state = conn.state_changes();
    drop(conn);

    state.wait_for(ConnectionState::is_stopped).await.unwrap();
    tokio::time::sleep(DELAY * 2).await;
    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(log.lock().last(), Some(&Seen::Close(CloseInfo::NORMAL)));
}
