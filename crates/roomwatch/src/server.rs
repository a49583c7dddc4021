//! `PublisherServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → telemetry. One
//! telemetry task owns the rooms; every accepted socket gets its own
//! handler task subscribed to it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use roomwatch_protocol::{Codec, JsonCodec};
use roomwatch_telemetry::{
    PublisherHandle, RandomSource, SeededRandom, TelemetryConfig,
    spawn_publisher,
};
use roomwatch_transport::{Transport, WebSocketTransport};

use crate::RoomwatchError;
use crate::handler::handle_connection;

/// Shared state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) publisher: PublisherHandle,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a publisher.
///
/// # Example
///
/// ```rust,no_run
/// use roomwatch::prelude::*;
///
/// # async fn run() -> Result<(), RoomwatchError> {
/// let server = PublisherServer::builder()
///     .bind("0.0.0.0:4000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PublisherServerBuilder {
    bind_addr: String,
    telemetry: TelemetryConfig,
    random: Option<Box<dyn RandomSource>>,
}

impl PublisherServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            telemetry: TelemetryConfig::default(),
            random: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Rooms, timer periods and draw range.
    pub fn telemetry(mut self, config: TelemetryConfig) -> Self {
        self.telemetry = config;
        self
    }

    /// Replaces the entropy-seeded generator, e.g. with a fixed seed.
    pub fn random(mut self, random: impl RandomSource) -> Self {
        self.random = Some(Box::new(random));
        self
    }

    /// Starts the telemetry task and binds the listener.
    ///
    /// # Errors
    /// Invalid telemetry settings or a failed bind.
    pub async fn build(self) -> Result<PublisherServer<JsonCodec>, RoomwatchError> {
        let random = self
            .random
            .unwrap_or_else(|| Box::new(SeededRandom::from_entropy()));
        let publisher = spawn_publisher(self.telemetry, random)?;
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        Ok(PublisherServer {
            transport,
            state: Arc::new(ServerState {
                publisher,
                codec: JsonCodec,
            }),
        })
    }
}

impl Default for PublisherServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound publisher. Call [`run()`](Self::run) to accept subscribers.
pub struct PublisherServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PublisherServer<JsonCodec> {
    pub fn builder() -> PublisherServerBuilder {
        PublisherServerBuilder::new()
    }
}

impl<C: Codec> PublisherServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the telemetry task, for snapshots and counters.
    pub fn publisher(&self) -> PublisherHandle {
        self.state.publisher.clone()
    }

    /// Runs the accept loop until the process ends.
    ///
    /// A failed accept or handshake only affects that one socket.
    pub async fn run(mut self) -> Result<(), RoomwatchError> {
        tracing::info!("Roomwatch publisher running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }

    /// Runs until `shutdown` completes, then stops the telemetry task.
    /// Open sockets see their event stream end.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RoomwatchError> {
        let publisher = self.publisher();
        tokio::select! {
            result = self.run() => result,
            () = shutdown => {
                tracing::info!("shutdown requested");
                publisher.shutdown().await?;
                Ok(())
            }
        }
    }
}
