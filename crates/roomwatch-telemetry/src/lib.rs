//! Room telemetry simulation for Roomwatch.
//!
//! The publisher owns the only copy of the room list and runs as an
//! isolated Tokio task. Two independent timers mutate one room each time
//! they fire, and every change is handed to all current subscribers.
//!
//! # Key types
//!
//! - [`spawn_publisher`] / [`PublisherHandle`]: start the task and talk to it
//! - [`RoomTable`]: the room list and its two mutations
//! - [`RandomSource`]: injectable randomness ([`SeededRandom`] by default)
//! - [`TelemetryConfig`]: seed rooms, timer periods, draw range

mod config;
mod error;
mod publisher;
mod random;
mod table;

pub use config::{
    DEFAULT_POWER_PERIOD, DEFAULT_STATUS_PERIOD, MAX_DRAW_DECIMALS,
    TelemetryConfig, default_rooms,
};
pub use error::TelemetryError;
pub use publisher::{
    EventReceiver, EventSender, PublisherHandle, PublisherInfo, SubscriberId,
    spawn_publisher,
};
pub use random::{RandomSource, SeededRandom};
pub use table::{RoomTable, round_to};
