//! Error types for the telemetry layer.

use roomwatch_protocol::RoomId;

/// Errors that can occur while configuring or talking to the publisher.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Two seed rooms share an id. Ids are identity and must be unique.
    #[error("duplicate room id {0} in seed list")]
    DuplicateRoom(RoomId),

    /// A configuration value is out of range.
    #[error("invalid telemetry config: {0}")]
    InvalidConfig(String),

    /// The publisher task has stopped and no longer accepts commands.
    #[error("telemetry publisher is unavailable")]
    Unavailable,
}
