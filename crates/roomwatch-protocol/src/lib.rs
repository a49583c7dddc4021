//! Wire protocol for Roomwatch.
//!
//! This crate defines what publisher and subscriber say to each other:
//!
//! - **Types** ([`Room`], [`ServerEvent`], [`ClientEvent`], [`EventKind`],
//!   etc.): the structures that travel on the socket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those structures
//!   become bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding,
//!   decoding or validating.
//!
//! ```text
//! Transport (bytes) → Protocol (ServerEvent / ClientEvent) → Telemetry / Client
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, EventKind, POWER_READING_EVENT, PowerReading, PowerUpdate,
    Room, RoomId, RoomStatus, ServerEvent, StatusUpdate,
};
