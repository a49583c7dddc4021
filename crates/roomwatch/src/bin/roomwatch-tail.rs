//! Connects to a publisher and logs every event it pushes.
//!
//! The URL comes from `ROOMWATCH_SOCKET_URL` (default
//! `ws://127.0.0.1:4000`). Stops on Ctrl-C.

use roomwatch::prelude::*;

fn log_event(event: &TelemetryEvent) -> anyhow::Result<()> {
    match event {
        TelemetryEvent::Connected => tracing::info!("connected"),
        TelemetryEvent::Disconnected { reason } => {
            tracing::warn!(%reason, "disconnected");
        }
        TelemetryEvent::InitialData(rooms) => {
            for room in rooms {
                tracing::info!(
                    room_id = %room.id,
                    name = %room.name,
                    status = %room.status,
                    current_draw = room.current_draw,
                    "room"
                );
            }
        }
        TelemetryEvent::RoomPowerUpdate(update) => tracing::info!(
            room_id = %update.room_id,
            room = %update.room_name,
            current_draw = update.current_draw,
            at = %update.timestamp,
            "power"
        ),
        TelemetryEvent::RoomStatusUpdate(update) => tracing::info!(
            room_id = %update.room_id,
            room = %update.room_name,
            status = %update.status,
            at = %update.timestamp,
            "status"
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), RoomwatchError> {
    roomwatch::init_tracing("roomwatch=info,roomwatch_client=info");

    let client = TelemetryClient::new(ClientConfig::from_env());
    tracing::info!(url = %client.config().url, "tailing publisher");

    let log = listener(log_event);
    for kind in [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::InitialData,
        EventKind::RoomPowerUpdate,
        EventKind::RoomStatusUpdate,
    ] {
        client.on(kind, log.clone());
    }
    client.connect()?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }
    // The session may already have given up; that is not an error here.
    let _ = client.disconnect();
    Ok(())
}
