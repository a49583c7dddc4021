//! # Roomwatch
//!
//! Real-time room telemetry. A publisher keeps the room list in memory,
//! changes one room's power draw or status on two fixed timers and pushes
//! every change to all WebSocket subscribers. [`TelemetryClient`] is the
//! matching subscriber.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomwatch::prelude::*;
//!
//! # async fn run() -> Result<(), RoomwatchError> {
//! let server = PublisherServer::builder().bind("127.0.0.1:4000").build().await?;
//! tokio::spawn(server.run());
//!
//! let client = TelemetryClient::new(ClientConfig::new("ws://127.0.0.1:4000"));
//! client.on(
//!     EventKind::RoomStatusUpdate,
//!     listener(|event| {
//!         println!("{event:?}");
//!         Ok(())
//!     }),
//! );
//! client.connect()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`TelemetryClient`]: roomwatch_client::TelemetryClient

pub mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, PublisherConfig};
pub use error::RoomwatchError;
pub use server::{PublisherServer, PublisherServerBuilder};

/// Installs the `tracing` subscriber used by the binaries. `RUST_LOG`
/// wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub mod prelude {
    pub use crate::{
        ConfigError, PublisherConfig, PublisherServer, PublisherServerBuilder,
        RoomwatchError,
    };
    pub use roomwatch_client::{
        ClientConfig, ClientError, Listener, TelemetryClient, TelemetryEvent,
        listener,
    };
    pub use roomwatch_protocol::{
        ClientEvent, Codec, EventKind, JsonCodec, POWER_READING_EVENT,
        PowerReading, PowerUpdate, ProtocolError, Room, RoomId, RoomStatus,
        ServerEvent, StatusUpdate,
    };
    pub use roomwatch_telemetry::{
        PublisherHandle, PublisherInfo, RandomSource, SeededRandom,
        TelemetryConfig, TelemetryError,
    };
    pub use roomwatch_tick::TickConfig;
    pub use roomwatch_transport::TransportError;
}
