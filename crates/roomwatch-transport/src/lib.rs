//! Socket layer for Roomwatch.
//!
//! The publisher listens through a [`Transport`]; each accepted peer, and
//! the subscriber's outbound socket, is a [`Connection`] carrying whole
//! frames. Nothing here knows about rooms or event names.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] and
//!   [`WebSocketConnection`] on top of `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Process-unique number assigned to every socket, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listening side: hands out one [`Connection`] per peer.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// One open socket.
///
/// `send` and `recv` take `&self` and must not block each other: on the
/// publisher a writer task pushes events while the handler sits in
/// `recv` waiting for the subscriber to leave.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next frame from the peer, or `Ok(None)` once it closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
