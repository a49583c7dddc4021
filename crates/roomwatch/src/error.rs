//! Unified error type for Roomwatch.

use roomwatch_client::ClientError;
use roomwatch_protocol::ProtocolError;
use roomwatch_telemetry::TelemetryError;
use roomwatch_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RoomwatchError {
    /// Bind, accept, send or receive failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Bad telemetry settings, or the publisher task is gone.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// Environment settings could not be parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
