//! Integration tests for `TelemetryClient` against a scripted publisher.
//!
//! The fake publisher is a bare `WebSocketTransport`: each test gets the
//! accepted connection and writes frames by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use roomwatch_client::{
    ClientConfig, ClientError, Listener, TelemetryClient, TelemetryEvent, listener,
};
use roomwatch_protocol::{
    ClientEvent, Codec, EventKind, JsonCodec, POWER_READING_EVENT, PowerReading,
    PowerUpdate, Room, RoomId, RoomStatus, ServerEvent, StatusUpdate,
};
use roomwatch_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

// =========================================================================
// Helpers
// =========================================================================

/// Binds a publisher stand-in and forwards every accepted connection.
async fn fake_publisher() -> (String, mpsc::UnboundedReceiver<WebSocketConnection>) {
    let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", transport.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok(conn) = transport.accept().await {
            if tx.send(conn).is_err() {
                break;
            }
        }
    });
    (url, rx)
}

fn fast_config(url: &str) -> ClientConfig {
    ClientConfig::new(url).with_reconnect(5, Duration::from_millis(20))
}

/// A listener that forwards every event it sees.
fn recorder() -> (Listener, mpsc::UnboundedReceiver<TelemetryEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let l = listener(move |event| {
        let _ = tx.send(event.clone());
        Ok(())
    });
    (l, rx)
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed")
}

async fn send(conn: &WebSocketConnection, event: &ServerEvent) {
    conn.send(&JsonCodec.encode(event).unwrap()).await.unwrap();
}

fn status_update(id: u32, status: RoomStatus) -> ServerEvent {
    ServerEvent::RoomStatusUpdate(StatusUpdate {
        room_id: RoomId(id),
        room_name: format!("Room {id}"),
        status,
        timestamp: Utc::now(),
    })
}

fn power_update(id: u32, draw: f64) -> ServerEvent {
    ServerEvent::RoomPowerUpdate(PowerUpdate {
        room_id: RoomId(id),
        room_name: format!("Room {id}"),
        current_draw: draw,
        timestamp: Utc::now(),
    })
}

/// Connects `client` and waits until the publisher side has accepted and
/// the client has raised its `connect` event.
async fn connect(
    client: &TelemetryClient,
    accepted: &mut mpsc::UnboundedReceiver<WebSocketConnection>,
) -> WebSocketConnection {
    let (on_connect, mut connected) = recorder();
    client.on(EventKind::Connect, Arc::clone(&on_connect));
    client.connect().unwrap();
    let conn = next(accepted).await;
    next(&mut connected).await;
    client.off(EventKind::Connect, &on_connect);
    conn
}

/// Everything up to and including a power update has been dispatched once
/// the fence listener sees it.
async fn fence(
    conn: &WebSocketConnection,
    fence_rx: &mut mpsc::UnboundedReceiver<TelemetryEvent>,
) {
    send(conn, &power_update(99, 0.0)).await;
    next(fence_rx).await;
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn test_initial_data_reaches_listener() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (l, mut rx) = recorder();
    client.on(EventKind::InitialData, l);

    let conn = connect(&client, &mut accepted).await;
    let rooms = vec![Room::new(RoomId(1), "Boardroom"), Room::new(RoomId(2), "Lab")];
    send(&conn, &ServerEvent::InitialData(rooms.clone())).await;

    assert_eq!(next(&mut rx).await, TelemetryEvent::InitialData(rooms));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_two_listeners_each_run_once() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (a, mut a_rx) = recorder();
    let (b, mut b_rx) = recorder();
    let (f, mut fence_rx) = recorder();
    client.on(EventKind::RoomStatusUpdate, a);
    client.on(EventKind::RoomStatusUpdate, b);
    client.on(EventKind::RoomPowerUpdate, f);

    let conn = connect(&client, &mut accepted).await;
    let event = status_update(4, RoomStatus::Reserved);
    send(&conn, &event).await;
    fence(&conn, &mut fence_rx).await;

    let expected = TelemetryEvent::from(event);
    assert_eq!(a_rx.try_recv().unwrap(), expected);
    assert_eq!(b_rx.try_recv().unwrap(), expected);
    assert!(a_rx.try_recv().is_err());
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_removed_listener_is_not_called() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (a, mut a_rx) = recorder();
    let (b, mut b_rx) = recorder();
    let (f, mut fence_rx) = recorder();
    client.on(EventKind::RoomStatusUpdate, Arc::clone(&a));
    client.on(EventKind::RoomStatusUpdate, b);
    client.on(EventKind::RoomPowerUpdate, f);

    assert!(client.off(EventKind::RoomStatusUpdate, &a));
    assert!(!client.off(EventKind::RoomStatusUpdate, &a));

    let conn = connect(&client, &mut accepted).await;
    send(&conn, &status_update(2, RoomStatus::InUse)).await;
    fence(&conn, &mut fence_rx).await;

    assert!(a_rx.try_recv().is_err());
    assert!(b_rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_duplicate_registration_runs_once() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (a, mut a_rx) = recorder();
    let (f, mut fence_rx) = recorder();
    assert!(client.on(EventKind::RoomStatusUpdate, Arc::clone(&a)));
    assert!(!client.on(EventKind::RoomStatusUpdate, Arc::clone(&a)));
    client.on(EventKind::RoomPowerUpdate, f);

    let conn = connect(&client, &mut accepted).await;
    send(&conn, &status_update(1, RoomStatus::Available)).await;
    fence(&conn, &mut fence_rx).await;

    assert!(a_rx.try_recv().is_ok());
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_failing_listeners_do_not_stop_others() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (good, mut good_rx) = recorder();
    client.on(
        EventKind::RoomPowerUpdate,
        listener(|_| Err(anyhow::anyhow!("listener rejected event"))),
    );
    client.on(EventKind::RoomPowerUpdate, listener(|_| panic!("listener bug")));
    client.on(EventKind::RoomPowerUpdate, good);

    let conn = connect(&client, &mut accepted).await;
    send(&conn, &power_update(1, 1.0)).await;
    send(&conn, &power_update(2, 2.0)).await;

    // The session survived both bad listeners and kept dispatching.
    next(&mut good_rx).await;
    match next(&mut good_rx).await {
        TelemetryEvent::RoomPowerUpdate(update) => assert_eq!(update.current_draw, 2.0),
        other => panic!("expected power update, got {other:?}"),
    }
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_listener_can_register_and_remove_during_dispatch() {
    let (url, mut accepted) = fake_publisher().await;
    let client = Arc::new(TelemetryClient::new(fast_config(&url)));
    let (late, mut late_rx) = recorder();

    let calls = Arc::new(AtomicUsize::new(0));
    let once: Arc<parking_lot::Mutex<Option<Listener>>> = Arc::default();
    let self_removing = {
        let client = Arc::clone(&client);
        let calls = Arc::clone(&calls);
        let once = Arc::clone(&once);
        let late = Arc::clone(&late);
        listener(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            client.on(EventKind::RoomPowerUpdate, Arc::clone(&late));
            if let Some(me) = once.lock().take() {
                client.off(EventKind::RoomPowerUpdate, &me);
            }
            Ok(())
        })
    };
    *once.lock() = Some(Arc::clone(&self_removing));
    client.on(EventKind::RoomPowerUpdate, self_removing);

    let conn = connect(&client, &mut accepted).await;
    send(&conn, &power_update(1, 0.5)).await;
    send(&conn, &power_update(1, 0.7)).await;

    // Added during the first event, so it only sees the second.
    match next(&mut late_rx).await {
        TelemetryEvent::RoomPowerUpdate(update) => assert_eq!(update.current_draw, 0.7),
        other => panic!("expected power update, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.listener_count(EventKind::RoomPowerUpdate), 1);

    client.disconnect().unwrap();
}

#[tokio::test]
async fn test_bad_frames_are_dropped() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (l, mut rx) = recorder();
    client.on(EventKind::RoomPowerUpdate, l);

    let conn = connect(&client, &mut accepted).await;
    conn.send(b"not json").await.unwrap();
    conn.send(br#"{"event":"room_deleted","data":{"room_id":1}}"#).await.unwrap();
    send(&conn, &power_update(3, -1.0)).await;
    send(&conn, &power_update(3, 1.25)).await;

    match next(&mut rx).await {
        TelemetryEvent::RoomPowerUpdate(update) => {
            assert_eq!(update.room_id, RoomId(3));
            assert_eq!(update.current_draw, 1.25);
        }
        other => panic!("expected power update, got {other:?}"),
    }
    assert!(client.is_connected());
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_connect_twice_reports_already_connected() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let _conn = connect(&client, &mut accepted).await;

    assert!(matches!(
        client.connect(),
        Err(ClientError::AlreadyConnected(u)) if u == url
    ));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_disconnect_clears_listeners_and_is_idempotent() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (l, _rx) = recorder();
    client.on(EventKind::RoomStatusUpdate, l);
    let conn = connect(&client, &mut accepted).await;

    client.disconnect().unwrap();
    assert!(!client.is_connected());
    assert_eq!(client.listener_count(EventKind::RoomStatusUpdate), 0);
    assert!(matches!(client.disconnect(), Err(ClientError::NotConnected)));

    // The publisher sees the socket close.
    let closed = timeout(WAIT, conn.recv()).await.expect("timed out");
    assert!(matches!(closed, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_emit_reaches_publisher() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let conn = connect(&client, &mut accepted).await;

    let reading = PowerReading {
        room_id: RoomId(5),
        current_draw: 2.4,
        timestamp: None,
    };
    assert!(client.emit(POWER_READING_EVENT, &reading));

    let frame = timeout(WAIT, conn.recv()).await.unwrap().unwrap().unwrap();
    let event: ClientEvent = JsonCodec.decode(&frame).unwrap();
    assert_eq!(event.event, POWER_READING_EVENT);
    let decoded: PowerReading = serde_json::from_value(event.data).unwrap();
    assert_eq!(decoded, reading);
}

#[tokio::test]
async fn test_emit_after_disconnect_is_dropped() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let _conn = connect(&client, &mut accepted).await;
    client.disconnect().unwrap();

    assert!(!client.emit(POWER_READING_EVENT, &serde_json::json!({"room_id": 1})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_while_old_session_is_busy() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));

    // Holds the first session task inside dispatch while the client moves on.
    let (busy_tx, mut busy_rx) = mpsc::unbounded_channel();
    client.on(
        EventKind::InitialData,
        listener(move |_| {
            let _ = busy_tx.send(());
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }),
    );
    let first = connect(&client, &mut accepted).await;
    send(&first, &ServerEvent::InitialData(Vec::new())).await;
    next(&mut busy_rx).await;

    client.disconnect().unwrap();
    let (on_disconnect, mut disconnected) = recorder();
    client.on(EventKind::Disconnect, on_disconnect);
    let second = connect(&client, &mut accepted).await;
    drop(first);

    // Let the first session wake up and wind down.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(client.is_connected());
    assert!(disconnected.try_recv().is_err());

    let reading = PowerReading {
        room_id: RoomId(3),
        current_draw: 1.1,
        timestamp: None,
    };
    assert!(client.emit(POWER_READING_EVENT, &reading));
    let frame = timeout(WAIT, second.recv()).await.unwrap().unwrap().unwrap();
    let event: ClientEvent = JsonCodec.decode(&frame).unwrap();
    assert_eq!(event.event, POWER_READING_EVENT);
}

#[tokio::test]
async fn test_reconnects_after_publisher_drops() {
    let (url, mut accepted) = fake_publisher().await;
    let client = TelemetryClient::new(fast_config(&url));
    let (gone, mut gone_rx) = recorder();
    let (back, mut back_rx) = recorder();
    client.on(EventKind::Disconnect, gone);

    let conn = connect(&client, &mut accepted).await;
    client.on(EventKind::Connect, back);
    conn.close().await.unwrap();
    drop(conn);

    assert!(matches!(
        next(&mut gone_rx).await,
        TelemetryEvent::Disconnected { .. }
    ));
    let _second = next(&mut accepted).await;
    assert_eq!(next(&mut back_rx).await, TelemetryEvent::Connected);
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    // Accepts TCP and hangs up at once, so every WebSocket handshake fails.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let client = TelemetryClient::new(
        ClientConfig::new(&url).with_reconnect(5, Duration::from_millis(20)),
    );
    client.connect().unwrap();

    timeout(WAIT, async {
        while attempts.load(Ordering::SeqCst) < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client never reached five attempts");

    // Room for a sixth attempt, which must not happen.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    assert!(!client.is_connected());

    // The session is over: disconnect has nothing to do, connect starts again.
    assert!(matches!(client.disconnect(), Err(ClientError::NotConnected)));
    client.connect().unwrap();
    client.disconnect().unwrap();
}

#[tokio::test]
async fn test_disconnect_stops_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let client = TelemetryClient::new(
        ClientConfig::new(&url).with_reconnect(1_000, Duration::from_millis(50)),
    );
    client.connect().unwrap();
    timeout(WAIT, async {
        while attempts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    client.disconnect().unwrap();
    let at_disconnect = attempts.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    // At most the attempt already in flight lands after disconnect.
    assert!(attempts.load(Ordering::SeqCst) <= at_disconnect + 1);
}

#[tokio::test]
async fn test_clients_are_independent() {
    let (url, mut accepted) = fake_publisher().await;
    let first = TelemetryClient::new(fast_config(&url));
    let second = TelemetryClient::new(fast_config(&url));
    let (a, mut a_rx) = recorder();
    let (b, mut b_rx) = recorder();
    first.on(EventKind::RoomStatusUpdate, a);
    second.on(EventKind::RoomStatusUpdate, b);

    let first_conn = connect(&first, &mut accepted).await;
    let _second_conn = connect(&second, &mut accepted).await;

    send(&first_conn, &status_update(1, RoomStatus::InUse)).await;
    next(&mut a_rx).await;
    second.disconnect().unwrap();

    assert!(first.is_connected());
    assert!(b_rx.try_recv().is_err());
}
