//! Runs the telemetry publisher in the foreground.
//!
//! `ROOMWATCH_PORT` (default 4000) picks the port; the listener binds all
//! interfaces. Stops on Ctrl-C.

use roomwatch::prelude::*;

#[tokio::main]
async fn main() -> Result<(), RoomwatchError> {
    roomwatch::init_tracing("roomwatch=info");

    let config = PublisherConfig::from_env()?;
    tracing::info!(
        "Roomwatch publisher v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_addr()
    );

    let server = PublisherServer::builder()
        .bind(&config.bind_addr())
        .telemetry(config.telemetry)
        .build()
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
