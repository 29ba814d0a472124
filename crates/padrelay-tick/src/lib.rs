//! Control-loop ticker for padrelay rooms.
//!
//! Each room runs a slow periodic control tick (500 ms by default) that
//! drives the adaptive send-ahead window and the liveness sweep. The ticker
//! is created idle and only starts when the room sees its first input
//! request or registration; until then [`TickScheduler::wait_for_tick`]
//! pends forever.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_tick() => {
//!             sync.on_control_tick();
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the actor wakes up late for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    ///
    /// A late wakeup never produces a burst of back-to-back ticks, so a
    /// stalled room cannot suddenly age every liveness counter by several
    /// ticks at once.
    #[default]
    Skip,
    /// Keep the original cadence. The next tick fires at its originally
    /// scheduled time even if that is already in the past.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Time between two control ticks.
    pub interval: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random jitter (0..max) added to the *first* tick so rooms started at
    /// the same instant do not tick in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            policy: TickPolicy::default(),
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Create a config for a specific interval with default settings.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_us = self.interval.as_micros() as u64,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// How many whole intervals were skipped due to overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Lazily started fixed-interval scheduler. One per room actor.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire. `None` while idle.
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Create an idle scheduler. Nothing fires until [`start`](Self::start).
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            config,
            tick_count: 0,
            next_tick: None,
        }
    }

    /// Create an idle scheduler for a specific interval with default settings.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Start ticking. The first tick fires one interval (plus jitter) from now.
    ///
    /// Returns `false` if the scheduler was already running; calling this
    /// on every input request is fine.
    pub fn start(&mut self) -> bool {
        if self.next_tick.is_some() {
            return false;
        }
        let jitter = if self.config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = self.config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max.max(1)))
        };
        self.next_tick = Some(Instant::now() + self.config.interval + jitter);
        debug!(jitter_us = jitter.as_micros() as u64, "tick scheduler started");
        true
    }

    /// Stop ticking. [`wait_for_tick`](Self::wait_for_tick) pends again until
    /// the next [`start`](Self::start).
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(tick = self.tick_count, "tick scheduler stopped");
        }
    }

    /// Wait until the next tick is due.
    ///
    /// While idle this future pends forever. It never resolves on its own,
    /// but `tokio::select!` will still process other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let interval = self.config.interval;
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "control tick overrun, skipping ahead"
                        );
                    }
                }
                // Always schedule from now, not from the missed deadline.
                now + interval
            }
            TickPolicy::Drop => next + interval,
        });

        trace!(tick = self.tick_count, overrun, "control tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Whether [`start`](Self::start) has been called (and not stopped).
    pub fn is_started(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
