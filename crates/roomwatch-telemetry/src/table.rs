//! The authoritative in-memory room list.
//!
//! Exactly one `RoomTable` exists per publisher, owned by the publisher
//! task. The two timer mutations below are its only write paths.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use roomwatch_protocol::{PowerUpdate, Room, RoomId, RoomStatus, StatusUpdate};

use crate::{RandomSource, TelemetryError};

/// Rooms in seed order.
#[derive(Debug, Clone)]
pub struct RoomTable {
    rooms: Vec<Room>,
}

impl RoomTable {
    /// Builds the table from a seed list.
    ///
    /// # Errors
    /// [`TelemetryError::DuplicateRoom`] if two rooms share an id.
    pub fn new(rooms: Vec<Room>) -> Result<Self, TelemetryError> {
        let mut seen = HashSet::with_capacity(rooms.len());
        for room in &rooms {
            if !seen.insert(room.id) {
                return Err(TelemetryError::DuplicateRoom(room.id));
            }
        }
        Ok(Self { rooms })
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn get(&self, id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    /// Owned copy of every room, as sent in `initial_data`.
    pub fn snapshot(&self) -> Vec<Room> {
        self.rooms.clone()
    }

    /// Power timer step: picks a room, draws a new reading in
    /// `[0, max_draw)` rounded to `decimals`, stores it.
    ///
    /// Returns `None` only when the table is empty.
    pub fn apply_power_reading(
        &mut self,
        random: &mut dyn RandomSource,
        max_draw: f64,
        decimals: u32,
        at: DateTime<Utc>,
    ) -> Option<PowerUpdate> {
        let room = self.pick(random)?;
        let draw = round_to(random.unit() * max_draw, decimals);
        room.current_draw = draw;

        Some(PowerUpdate {
            room_id: room.id,
            room_name: room.name.clone(),
            current_draw: draw,
            timestamp: at,
        })
    }

    /// Status timer step: picks a room and a status, stores it.
    ///
    /// The new status may equal the old one; the event is emitted anyway.
    pub fn apply_status_change(
        &mut self,
        random: &mut dyn RandomSource,
        at: DateTime<Utc>,
    ) -> Option<StatusUpdate> {
        let room = self.pick(random)?;
        let status = RoomStatus::ALL[random.index(RoomStatus::ALL.len())
            % RoomStatus::ALL.len()];
        room.status = status;

        Some(StatusUpdate {
            room_id: room.id,
            room_name: room.name.clone(),
            status,
            timestamp: at,
        })
    }

    fn pick(&mut self, random: &mut dyn RandomSource) -> Option<&mut Room> {
        if self.rooms.is_empty() {
            return None;
        }
        let len = self.rooms.len();
        let i = random.index(len) % len;
        self.rooms.get_mut(i)
    }
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
