//! Error types for the subscriber.

/// Conditions reported by [`TelemetryClient`](crate::TelemetryClient).
///
/// None of these are fatal; each is logged where it happens and returned
/// so callers can react if they care.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// `connect()` while a session is already running.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    /// `disconnect()` with no session running.
    #[error("not connected")]
    NotConnected,

    /// `connect()` was called outside a Tokio runtime.
    #[error("no Tokio runtime available to run the connection")]
    NoRuntime,
}
