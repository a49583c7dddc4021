use std::io;

/// Failures in the socket layer.
///
/// WebSocket library errors are kept as text so this type does not depend
/// on which transport feature is enabled.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// Dialing or the WebSocket upgrade failed. `peer` is the remote
    /// address on accept and the URL on connect.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: String, reason: String },

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to receive frame: {0}")]
    Receive(String),
}
