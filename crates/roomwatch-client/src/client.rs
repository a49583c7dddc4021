//! The subscriber: one background session task per connected client.
//!
//! ```text
//!  TelemetryClient ──connect()──▶ session task
//!        │                            │  dial ──fail──▶ wait, retry (bounded)
//!        │  emit() ──outbound──▶      │  ok ──▶ read frames ──▶ registry.dispatch
//!        │  disconnect() ──stop──▶    │  dropped ──▶ wait, retry
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use roomwatch_protocol::{ClientEvent, Codec, EventKind, JsonCodec, ServerEvent};
use roomwatch_transport::{Connection, WebSocketConnection};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::registry::{Listener, ListenerRegistry};
use crate::{ClientConfig, ClientError, TelemetryEvent};

/// What a session task may touch. A retired task keeps writing its own
/// `connected` flag and dispatching under its own epoch, neither of which
/// reaches the session that replaced it.
struct SessionContext {
    registry: Arc<ListenerRegistry>,
    epoch: u64,
    connected: Arc<AtomicBool>,
}

impl SessionContext {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn dispatch(&self, event: &TelemetryEvent) {
        self.registry.dispatch(self.epoch, event);
    }
}

/// A running session, owned by the client that started it.
struct Session {
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    /// Firing or dropping this ends the session task.
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Session {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Subscriber for the telemetry feed.
///
/// Independent instances may point at the same or different publishers.
/// Dropping the client ends its session.
///
/// ```rust,no_run
/// use roomwatch_client::{ClientConfig, TelemetryClient, TelemetryEvent, listener};
/// use roomwatch_protocol::EventKind;
///
/// # async fn run() {
/// let client = TelemetryClient::new(ClientConfig::default());
/// client.on(
///     EventKind::RoomPowerUpdate,
///     listener(|event| {
///         if let TelemetryEvent::RoomPowerUpdate(update) = event {
///             println!("{} now draws {} A", update.room_name, update.current_draw);
///         }
///         Ok(())
///     }),
/// );
/// client.connect().ok();
/// # }
/// ```
pub struct TelemetryClient {
    config: ClientConfig,
    registry: Arc<ListenerRegistry>,
    session: Mutex<Option<Session>>,
    codec: JsonCodec,
}

impl TelemetryClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ListenerRegistry::default()),
            session: Mutex::new(None),
            codec: JsonCodec,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts the session task and returns immediately. Connection
    /// failures are retried in the background and only logged.
    ///
    /// # Errors
    /// - [`ClientError::AlreadyConnected`] while a session is running,
    ///   including one that is between reconnect attempts.
    /// - [`ClientError::NoRuntime`] outside a Tokio runtime.
    pub fn connect(&self) -> Result<(), ClientError> {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(Session::is_alive) {
            tracing::warn!(url = %self.config.url, "already connected");
            return Err(ClientError::AlreadyConnected(self.config.url.clone()));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            tracing::error!("connect() called outside a Tokio runtime");
            ClientError::NoRuntime
        })?;

        let connected = Arc::new(AtomicBool::new(false));
        let context = SessionContext {
            registry: Arc::clone(&self.registry),
            epoch: self.registry.epoch(),
            connected: Arc::clone(&connected),
        };
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(run_session(
            self.config.clone(),
            context,
            outbound_rx,
            stop_rx,
        ));

        *session = Some(Session {
            connected,
            outbound: outbound_tx,
            stop: stop_tx,
            task,
        });
        Ok(())
    }

    /// Closes the connection, stops any pending reconnect and removes
    /// every listener.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] when no session is running, which
    /// includes a session that already gave up reconnecting.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        let session = self.session.lock().take();
        match session {
            Some(session) if session.is_alive() => {
                session.connected.store(false, Ordering::SeqCst);
                self.registry.clear();
                let _ = session.stop.send(());
                tracing::info!(url = %self.config.url, "disconnected");
                Ok(())
            }
            _ => {
                tracing::warn!(url = %self.config.url, "disconnect() while not connected");
                Err(ClientError::NotConnected)
            }
        }
    }

    /// Registers `listener` for `kind`. Returns `false` if that same
    /// listener was already registered.
    pub fn on(&self, kind: EventKind, listener: Listener) -> bool {
        self.registry.add(kind, listener)
    }

    /// Removes `listener` from `kind`. Returns `false` if it was not
    /// registered.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.registry.remove(kind, listener)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry.len(kind)
    }

    /// Sends an application event to the publisher, fire-and-forget.
    ///
    /// Returns whether the event was queued. While disconnected the event
    /// is dropped with a warning.
    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) -> bool {
        let guard = self.session.lock();
        let Some(session) = guard.as_ref().filter(|s| s.is_connected()) else {
            tracing::warn!(event, "not connected, dropping outgoing event");
            return false;
        };

        let frame = match ClientEvent::new(event, payload)
            .and_then(|message| self.codec.encode(&message))
        {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event, error = %e, "could not encode outgoing event");
                return false;
            }
        };

        session.outbound.send(frame).is_ok()
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().as_ref().is_some_and(Session::is_connected)
    }
}

enum SessionEnd {
    Stopped,
    Dropped(String),
}

async fn run_session(
    config: ClientConfig,
    context: SessionContext,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut stop: oneshot::Receiver<()>,
) {
    let url = config.url.as_str();
    let max = config.max_reconnect_attempts;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let dialed = tokio::select! {
            _ = &mut stop => break,
            dialed = WebSocketConnection::connect(url) => dialed,
        };

        match dialed {
            Ok(conn) => {
                attempts = 0;
                context.set_connected(true);
                tracing::info!(url, conn_id = %conn.id(), "connected to publisher");
                context.dispatch(&TelemetryEvent::Connected);

                match drive(&conn, &context, &mut outbound, &mut stop).await {
                    SessionEnd::Stopped => {
                        let _ = conn.close().await;
                        break;
                    }
                    SessionEnd::Dropped(reason) => {
                        context.set_connected(false);
                        tracing::warn!(url, %reason, "connection to publisher lost");
                        context.dispatch(&TelemetryEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    attempt = attempts,
                    max_attempts = max,
                    error = %e,
                    "connection attempt failed"
                );
                if attempts >= max {
                    tracing::error!(url, attempts, "giving up on publisher");
                    break;
                }
            }
        }

        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    context.set_connected(false);
    tracing::debug!(url, "session ended");
}

/// Pumps one open connection until it drops or the client stops it.
async fn drive(
    conn: &WebSocketConnection,
    context: &SessionContext,
    outbound: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    stop: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let codec = JsonCodec;
    loop {
        tokio::select! {
            _ = &mut *stop => return SessionEnd::Stopped,
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return SessionEnd::Stopped;
                };
                let sent = tokio::select! {
                    _ = &mut *stop => return SessionEnd::Stopped,
                    sent = conn.send(&frame) => sent,
                };
                if let Err(e) = sent {
                    return SessionEnd::Dropped(e.to_string());
                }
            }
            received = conn.recv() => match received {
                Ok(Some(data)) => handle_frame(&codec, context, &data),
                Ok(None) => {
                    return SessionEnd::Dropped("publisher closed the connection".into());
                }
                Err(e) => return SessionEnd::Dropped(e.to_string()),
            },
        }
    }
}

/// Decodes, validates and dispatches one frame. Bad frames are skipped.
fn handle_frame(codec: &JsonCodec, context: &SessionContext, data: &[u8]) {
    let event: ServerEvent = match codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, len = data.len(), "dropping undecodable frame");
            return;
        }
    };
    if let Err(e) = event.validate() {
        tracing::warn!(kind = %event.kind(), error = %e, "dropping invalid event");
        return;
    }

    tracing::trace!(kind = %event.kind(), "dispatching event");
    context.dispatch(&TelemetryEvent::from(event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_outside_runtime_is_refused() {
        let client = TelemetryClient::new(ClientConfig::default());
        assert!(matches!(client.connect(), Err(ClientError::NoRuntime)));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_disconnect_before_connect() {
        let client = TelemetryClient::new(ClientConfig::default());
        assert!(matches!(client.disconnect(), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_emit_before_connect_is_dropped() {
        let client = TelemetryClient::new(ClientConfig::default());
        assert!(!client.emit("power_reading", &serde_json::json!({"room_id": 1})));
    }
}
