//! Error types for the protocol layer.
//!
//! Each crate in Roomwatch defines its own error enum. A `ProtocolError`
//! always means the problem is in turning events into bytes or back, not
//! in networking or in the room table.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `event` tag,
    /// missing fields or wrong field types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The event decoded but carries values outside their domain, e.g. a
    /// negative or non-finite current draw.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
