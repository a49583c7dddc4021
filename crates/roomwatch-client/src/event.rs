//! Typed events handed to listeners.

use roomwatch_protocol::{EventKind, PowerUpdate, Room, ServerEvent, StatusUpdate};

/// One decoded event, as seen by a listener.
///
/// The three publisher events map one to one onto [`ServerEvent`];
/// `Connected` and `Disconnected` are raised by the client itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// The socket to the publisher is open.
    Connected,
    /// An open socket went away. Not raised by `disconnect()`.
    Disconnected { reason: String },
    InitialData(Vec<Room>),
    RoomPowerUpdate(PowerUpdate),
    RoomStatusUpdate(StatusUpdate),
}

impl TelemetryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TelemetryEvent::Connected => EventKind::Connect,
            TelemetryEvent::Disconnected { .. } => EventKind::Disconnect,
            TelemetryEvent::InitialData(_) => EventKind::InitialData,
            TelemetryEvent::RoomPowerUpdate(_) => EventKind::RoomPowerUpdate,
            TelemetryEvent::RoomStatusUpdate(_) => EventKind::RoomStatusUpdate,
        }
    }
}

impl From<ServerEvent> for TelemetryEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::InitialData(rooms) => TelemetryEvent::InitialData(rooms),
            ServerEvent::RoomPowerUpdate(u) => TelemetryEvent::RoomPowerUpdate(u),
            ServerEvent::RoomStatusUpdate(u) => {
                TelemetryEvent::RoomStatusUpdate(u)
            }
        }
    }
}
