//! Publisher configuration and the default room seed.

use std::time::Duration;

use roomwatch_protocol::{Room, RoomId};
use roomwatch_tick::TickConfig;

use crate::TelemetryError;

/// Default period of the power timer.
pub const DEFAULT_POWER_PERIOD: Duration = Duration::from_secs(3);

/// Default period of the status timer.
pub const DEFAULT_STATUS_PERIOD: Duration = Duration::from_secs(10);

/// Most decimal places an `f64` draw can meaningfully keep.
pub const MAX_DRAW_DECIMALS: u32 = 15;

/// Configuration for the telemetry publisher.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Rooms loaded at startup. Ids must be unique.
    pub rooms: Vec<Room>,

    /// Timer that overwrites one room's current draw.
    pub power: TickConfig,

    /// Timer that overwrites one room's status.
    pub status: TickConfig,

    /// Upper bound (exclusive) of simulated draws, in amperes.
    pub max_draw: f64,

    /// Decimal places kept when rounding a simulated draw.
    pub draw_decimals: u32,

    /// Capacity of the publisher's command channel.
    pub channel_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            rooms: default_rooms(),
            power: TickConfig::every(DEFAULT_POWER_PERIOD),
            status: TickConfig::every(DEFAULT_STATUS_PERIOD),
            max_draw: 3.0,
            draw_decimals: 2,
            channel_size: 64,
        }
    }
}

impl TelemetryConfig {
    /// Checks ranges the type system can't express.
    ///
    /// # Errors
    /// [`TelemetryError::InvalidConfig`] for a non-positive or non-finite
    /// `max_draw`, more than [`MAX_DRAW_DECIMALS`] decimals, or a zero
    /// `channel_size`.
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if !(self.max_draw.is_finite() && self.max_draw > 0.0) {
            return Err(TelemetryError::InvalidConfig(format!(
                "max_draw must be a positive number, got {}",
                self.max_draw
            )));
        }
        if self.draw_decimals > MAX_DRAW_DECIMALS {
            return Err(TelemetryError::InvalidConfig(format!(
                "draw_decimals must be at most {MAX_DRAW_DECIMALS}, got {}",
                self.draw_decimals
            )));
        }
        if self.channel_size == 0 {
            return Err(TelemetryError::InvalidConfig(
                "channel_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// The six rooms every fresh publisher starts with: all available, no
/// draw.
pub fn default_rooms() -> Vec<Room> {
    [
        "Boardroom",
        "Huddle Room 1",
        "Huddle Room 2",
        "Training Room",
        "Recording Studio",
        "Hardware Lab",
    ]
    .into_iter()
    .zip(1..)
    .map(|(name, id)| Room::new(RoomId(id), name))
    .collect()
}
