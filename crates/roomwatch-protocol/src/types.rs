//! Core protocol types for Roomwatch's wire format.
//!
//! Every type that travels on the telemetry socket lives here: the room
//! record itself, the two change events, the one-time snapshot, and the
//! free-form events a subscriber may send back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identifier of a room, assigned at publisher startup.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire, so
/// `RoomId(4)` is `4`, not `{"0":4}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Occupancy status of a room. A closed set.
///
/// Serialized in kebab-case, so `InUse` is `"in-use"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatus {
    Available,
    InUse,
    Reserved,
}

impl RoomStatus {
    /// Every status, in a fixed order. Random status selection indexes
    /// into this.
    pub const ALL: [RoomStatus; 3] =
        [RoomStatus::Available, RoomStatus::InUse, RoomStatus::Reserved];

    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::InUse => "in-use",
            RoomStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One room as the publisher sees it.
///
/// The dashboard shares this shape with its database rows, hence the
/// camelCase field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub status: RoomStatus,
    /// Current power draw in amperes. Never negative.
    pub current_draw: f64,
}

impl Room {
    /// A room that is available and drawing nothing.
    pub fn new(id: RoomId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: RoomStatus::Available,
            current_draw: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// Emitted once each time the power timer overwrites a room's draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpdate {
    pub room_id: RoomId,
    pub room_name: String,
    pub current_draw: f64,
    /// Wall-clock time of the mutation, RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,
}

/// Emitted once each time the status timer overwrites a room's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub room_id: RoomId,
    pub room_name: String,
    pub status: RoomStatus,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The named category of an event, used to subscribe to it.
///
/// `Connect` and `Disconnect` never travel on the wire; the subscriber
/// raises them locally when the socket opens or drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Disconnect,
    InitialData,
    RoomPowerUpdate,
    RoomStatusUpdate,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::InitialData => "initial_data",
            EventKind::RoomPowerUpdate => "room_power_update",
            EventKind::RoomStatusUpdate => "room_status_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ServerEvent: publisher → subscriber
// ---------------------------------------------------------------------------

/// Everything the publisher pushes to subscribers.
///
/// `#[serde(tag = "event", content = "data")]` produces "adjacently
/// tagged" JSON, one named event carrying its payload:
///
/// ```text
/// {"event":"room_power_update","data":{"room_id":3,"room_name":"Lab","current_draw":1.25,"timestamp":"..."}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full room list, sent once to each new connection.
    InitialData(Vec<Room>),
    RoomPowerUpdate(PowerUpdate),
    RoomStatusUpdate(StatusUpdate),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::InitialData(_) => EventKind::InitialData,
            ServerEvent::RoomPowerUpdate(_) => EventKind::RoomPowerUpdate,
            ServerEvent::RoomStatusUpdate(_) => EventKind::RoomStatusUpdate,
        }
    }

    /// Checks values serde cannot: draws must be finite and non-negative.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] naming the offending room.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ServerEvent::InitialData(rooms) => rooms
                .iter()
                .try_for_each(|room| check_draw(room.id, room.current_draw)),
            ServerEvent::RoomPowerUpdate(update) => {
                check_draw(update.room_id, update.current_draw)
            }
            ServerEvent::RoomStatusUpdate(_) => Ok(()),
        }
    }
}

fn check_draw(room_id: RoomId, draw: f64) -> Result<(), ProtocolError> {
    if draw.is_finite() && draw >= 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidMessage(format!(
            "room {room_id} has invalid current draw {draw}"
        )))
    }
}

// ---------------------------------------------------------------------------
// ClientEvent: subscriber → publisher
// ---------------------------------------------------------------------------

/// Event name the dashboard uses to submit a manual power reading.
pub const POWER_READING_EVENT: &str = "power_reading";

/// An application-defined event sent by a subscriber. The name and
/// payload are free-form; the publisher does not interpret them beyond
/// logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ClientEvent {
    /// Builds an event from any serializable payload.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the payload cannot be
    /// represented as JSON (e.g. a map with non-string keys).
    pub fn new<T: Serialize>(
        event: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(payload).map_err(ProtocolError::Encode)?,
        })
    }
}

/// Payload of a [`POWER_READING_EVENT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    pub room_id: RoomId,
    pub current_draw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
