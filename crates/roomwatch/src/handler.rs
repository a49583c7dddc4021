//! Per-connection handler: subscribe, stream events out, log what the
//! subscriber sends in.
//!
//! Each accepted socket runs this on its own task, plus one writer task
//! that drains the subscriber channel. A slow socket only delays its own
//! writer; the telemetry task never waits on it.

use std::sync::Arc;

use roomwatch_protocol::{
    ClientEvent, Codec, POWER_READING_EVENT, PowerReading,
};
use roomwatch_telemetry::{PublisherHandle, SubscriberId};
use roomwatch_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::RoomwatchError;
use crate::server::ServerState;

/// Drop guard that leaves the broadcast set when the handler exits,
/// including by panic. `Drop` is synchronous, so the unsubscribe is a
/// fire-and-forget task.
struct SubscriptionGuard {
    id: SubscriberId,
    publisher: PublisherHandle,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let id = self.id;
        let publisher = self.publisher.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = publisher.unsubscribe(id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RoomwatchError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let (sub_id, mut events) = state.publisher.subscribe().await?;
    let _guard = SubscriptionGuard {
        id: sub_id,
        publisher: state.publisher.clone(),
    };
    tracing::info!(%conn_id, %sub_id, "subscriber connected");

    // No backpressure: while `send` is stuck, events pile up in the
    // subscriber's unbounded channel.
    let writer = {
        let conn = Arc::clone(&conn);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let frame = match state.codec.encode(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(
                            %conn_id, kind = %event.kind(), error = %e,
                            "failed to encode event"
                        );
                        continue;
                    }
                };
                if let Err(e) = conn.send(&frame).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                    break;
                }
            }
        })
    };

    loop {
        match conn.recv().await {
            Ok(Some(data)) => handle_client_frame(&state.codec, conn_id, &data),
            Ok(None) => {
                tracing::info!(%conn_id, %sub_id, "subscriber disconnected");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        }
    }

    writer.abort();
    Ok(())
}

/// Subscriber-sent events are logged only; nothing reaches the room table.
fn handle_client_frame<C: Codec>(codec: &C, conn_id: ConnectionId, data: &[u8]) {
    let event: ClientEvent = match codec.decode(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(%conn_id, error = %e, "failed to decode client event");
            return;
        }
    };

    if event.event != POWER_READING_EVENT {
        tracing::info!(%conn_id, event = %event.event, "client event received");
        return;
    }

    match serde_json::from_value::<PowerReading>(event.data) {
        Ok(reading) if reading.current_draw.is_finite() && reading.current_draw >= 0.0 => {
            tracing::info!(
                %conn_id,
                room_id = %reading.room_id,
                current_draw = reading.current_draw,
                "power reading submitted"
            );
        }
        Ok(reading) => {
            tracing::warn!(
                %conn_id,
                room_id = %reading.room_id,
                current_draw = reading.current_draw,
                "power reading out of range"
            );
        }
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "malformed power reading");
        }
    }
}
