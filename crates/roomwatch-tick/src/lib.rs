//! Fixed-period tick scheduler for Roomwatch.
//!
//! The publisher runs two independent timers (power readings and status
//! changes). Each one is a [`TickScheduler`] awaited inside the telemetry
//! actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* subscribe, unsubscribe, ... */ }
//!         _ = power.wait_for_tick() => { /* mutate one draw, broadcast */ }
//!         _ = status.wait_for_tick() => { /* mutate one status, broadcast */ }
//!     }
//! }
//! ```
//!
//! [`TickScheduler::wait_for_tick`] is cancel-safe: if another branch
//! wins, nothing about the schedule changes.
//!
//! A scheduler without a period is *disabled*; its tick never fires.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Configuration for one timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickConfig {
    /// Time between ticks. `None` disables the timer.
    pub period: Option<Duration>,
}

impl TickConfig {
    /// A timer firing every `period`.
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
        }
    }

    /// A timer that never fires.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Normalizes the config: a zero period would spin, so it is treated
    /// as disabled.
    pub fn validated(mut self) -> Self {
        if self.period == Some(Duration::ZERO) {
            warn!("tick period of zero would spin; disabling timer");
            self.period = None;
        }
        self
    }
}

/// Fixed-period tick scheduler. One per timer.
///
/// A tick that fires late (the actor was busy) does not trigger a burst
/// of catch-up ticks: the next one is scheduled a full period after the
/// late one.
pub struct TickScheduler {
    period: Option<Duration>,
    tick_count: u64,
    /// When the next tick is due. `None` when disabled.
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Creates a scheduler; the first tick is due one period from now.
    pub fn new(config: TickConfig) -> Self {
        let period = config.validated().period;

        match period {
            Some(period) => debug!(
                period_ms = period.as_millis() as u64,
                "tick scheduler created"
            ),
            None => debug!("tick scheduler created disabled"),
        }

        Self {
            period,
            tick_count: 0,
            next_tick: period.map(|period| Instant::now() + period),
        }
    }

    /// Waits until the next tick is due and returns its number, starting
    /// at 1.
    ///
    /// A disabled scheduler pends forever, which lets it sit in a
    /// `tokio::select!` without special casing.
    pub async fn wait_for_tick(&mut self) -> u64 {
        let (next, period) = match (self.next_tick, self.period) {
            (Some(next), Some(period)) => (next, period),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        // Past the only await point: from here on the tick is committed.
        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        if late_by >= period {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "timer overrun, skipping missed ticks"
            );
        }
        self.next_tick = Some(now + period);

        trace!(tick = self.tick_count, "tick fired");
        self.tick_count
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
