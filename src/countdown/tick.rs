//! Tick source abstraction
//!
//! The host owns the clock. Countdowns only need "call this closure at a
//! fixed rate until I say stop" plus a place to run one-off callbacks, which
//! is what [`TickSource`] captures. [`IntervalTickSource`] is the Tokio
//! adapter used by the binary and the tests.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::CountdownError;

const ONE_SECOND_NANOS: u128 = 1_000_000_000;

/// Closure invoked on every tick.
pub type TickTask = Box<dyn FnMut() + Send + 'static>;

/// One-off task handed to the host's execution context.
pub type HostTask = Box<dyn FnOnce() + Send + 'static>;

/// Fixed tick granularity and the conversions derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRate {
    granularity: Duration,
}

impl TickRate {
    /// Server-tick granularity of the reference host (20 ticks per second).
    pub const DEFAULT_GRANULARITY: Duration = Duration::from_millis(50);

    /// Creates a tick rate.
    ///
    /// # Errors
    ///
    /// Returns [`CountdownError::InvalidGranularity`] when `granularity` is zero
    /// or longer than one second.
    pub fn new(granularity: Duration) -> Result<Self, CountdownError> {
        if granularity.is_zero() || granularity > Duration::from_secs(1) {
            return Err(CountdownError::InvalidGranularity { granularity });
        }
        Ok(Self { granularity })
    }

    /// Returns the duration of a single tick.
    #[must_use]
    pub const fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Whole ticks per second (rounded down, at least 1).
    #[must_use]
    pub fn ticks_per_second(&self) -> u64 {
        u64::try_from(ONE_SECOND_NANOS / self.granularity.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Whole ticks that fit into `duration` (rounded down).
    #[must_use]
    pub fn ticks_in(&self, duration: Duration) -> u64 {
        u64::try_from(duration.as_nanos() / self.granularity.as_nanos()).unwrap_or(u64::MAX)
    }

    /// Whole seconds represented by `ticks` (rounded down).
    #[must_use]
    pub fn seconds_in(&self, ticks: u64) -> u64 {
        ticks / self.ticks_per_second()
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self {
            granularity: Self::DEFAULT_GRANULARITY,
        }
    }
}

/// Cancellable handle for a repeating tick task.
///
/// Cloning yields another handle to the same task.
#[derive(Debug, Clone, Default)]
pub struct TickHandle {
    token: CancellationToken,
}

impl TickHandle {
    /// Wraps a cancellation token observed by the tick task.
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops further invocations of the tick task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns whether the tick task has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Host scheduler consumed by the countdown core.
pub trait TickSource: Send + Sync + 'static {
    /// The fixed rate at which repeating tasks are invoked.
    fn rate(&self) -> TickRate;

    /// Invokes `task` after `initial_delay` and then once every `period`
    /// until the returned handle is cancelled.
    fn schedule_repeating(
        &self,
        task: TickTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TickHandle;

    /// Runs a one-off task on the host's execution context.
    fn run_task(&self, task: HostTask);
}

/// Tokio-backed tick source: one `interval` task per repeating schedule.
#[derive(Debug, Clone)]
pub struct IntervalTickSource {
    rate: TickRate,
    runtime: Handle,
}

impl IntervalTickSource {
    /// Creates a tick source spawning onto `runtime`.
    #[must_use]
    pub const fn new(rate: TickRate, runtime: Handle) -> Self {
        Self { rate, runtime }
    }

    /// Creates a tick source on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn current(rate: TickRate) -> Self {
        Self::new(rate, Handle::current())
    }
}

impl TickSource for IntervalTickSource {
    fn rate(&self) -> TickRate {
        self.rate
    }

    fn schedule_repeating(
        &self,
        mut task: TickTask,
        initial_delay: Duration,
        period: Duration,
    ) -> TickHandle {
        let token = CancellationToken::new();
        let stop = token.clone();
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
            // Fixed rate: late ticks are delivered back to back.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => {
                        trace!("tick task stopped");
                        break;
                    }
                    _ = interval.tick() => task(),
                }
            }
        });
        TickHandle::new(token)
    }

    fn run_task(&self, task: HostTask) {
        self.runtime.spawn(async move { task() });
    }
}
