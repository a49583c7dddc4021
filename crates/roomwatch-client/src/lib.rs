//! Telemetry subscriber for Roomwatch.
//!
//! [`TelemetryClient`] keeps one WebSocket connection to a publisher,
//! reconnects a bounded number of times when it drops, and hands every
//! decoded event to the listeners registered for its kind. A listener
//! that fails or panics is logged and skipped; the others still run.
//!
//! # Key types
//!
//! - [`TelemetryClient`]: `connect`, `disconnect`, `on`, `off`, `emit`
//! - [`TelemetryEvent`]: what listeners receive
//! - [`Listener`] / [`listener`]: callback type and constructor
//! - [`ClientConfig`]: URL and reconnect policy

mod client;
mod config;
mod error;
mod event;
mod registry;

pub use client::TelemetryClient;
pub use config::{ClientConfig, DEFAULT_SOCKET_URL, SOCKET_URL_ENV};
pub use error::ClientError;
pub use event::TelemetryEvent;
pub use registry::{Listener, listener};
