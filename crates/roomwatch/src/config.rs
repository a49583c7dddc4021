//! Publisher settings read from the environment.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use roomwatch_telemetry::TelemetryConfig;
use roomwatch_tick::TickConfig;
use tracing::{info, warn};

/// Port the publisher listens on.
pub const PORT_ENV: &str = "ROOMWATCH_PORT";
/// Power timer period in milliseconds; `0` turns the timer off.
pub const POWER_PERIOD_ENV: &str = "ROOMWATCH_POWER_PERIOD_MS";
/// Status timer period in milliseconds; `0` turns the timer off.
pub const STATUS_PERIOD_ENV: &str = "ROOMWATCH_STATUS_PERIOD_MS";

pub const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, thiserror::Error)]
#[error("invalid {key} value {value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Everything the `roomwatch-publisher` binary needs to start.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub port: u16,
    pub telemetry: TelemetryConfig,
}

impl PublisherConfig {
    /// Reads `ROOMWATCH_*` variables, using defaults for unset ones.
    ///
    /// # Errors
    /// [`ConfigError`] when a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injected lookup.
    pub fn load(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut telemetry = TelemetryConfig::default();
        if let Some(ms) = try_load::<u64>(&lookup, POWER_PERIOD_ENV)? {
            telemetry.power = TickConfig::every(Duration::from_millis(ms));
        }
        if let Some(ms) = try_load::<u64>(&lookup, STATUS_PERIOD_ENV)? {
            telemetry.status = TickConfig::every(Duration::from_millis(ms));
        }

        let port = try_load(&lookup, PORT_ENV)?.unwrap_or_else(|| {
            info!("{PORT_ENV} not set, using default: {DEFAULT_PORT}");
            DEFAULT_PORT
        });

        Ok(Self { port, telemetry })
    }

    /// Listens on every interface.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
