//! Connection settings for a [`TelemetryClient`](crate::TelemetryClient).

use std::time::Duration;

/// Publisher address used when nothing else is configured.
pub const DEFAULT_SOCKET_URL: &str = "ws://127.0.0.1:4000";

/// Environment variable read by [`ClientConfig::from_env`].
pub const SOCKET_URL_ENV: &str = "ROOMWATCH_SOCKET_URL";

/// Where to connect and how hard to try.
///
/// ```rust
/// use std::time::Duration;
/// use roomwatch_client::ClientConfig;
///
/// let config = ClientConfig::new("ws://10.0.0.5:4000")
///     .with_reconnect(3, Duration::from_millis(500));
/// assert_eq!(config.max_reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket URL of the publisher.
    pub url: String,

    /// Connection attempts allowed per outage before giving up.
    /// The count starts over after every successful connection.
    pub max_reconnect_attempts: u32,

    /// Pause between two attempts.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOCKET_URL.to_string(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Reads the URL from `ROOMWATCH_SOCKET_URL`, falling back to
    /// [`DEFAULT_SOCKET_URL`]. Meant for binaries; libraries should pass
    /// the URL explicitly.
    pub fn from_env() -> Self {
        match std::env::var(SOCKET_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts.max(1);
        self.reconnect_delay = delay;
        self
    }
}
