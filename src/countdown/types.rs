//! Countdown value types
//!
//! Identifiers, phases and the callback signatures shared between the
//! registry and the background tasks that drive each countdown.

use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newtype wrapper for countdown identifiers, used as `DashMap` keys.
///
/// Stable for the life of a countdown; a removed id may be reused to
/// start a brand-new countdown.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountdownId(String);

impl CountdownId {
    /// Creates a new `CountdownId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CountdownId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CountdownId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CountdownId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CountdownId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Self> for CountdownId {
    fn from(id: &Self) -> Self {
        id.clone()
    }
}

/// Per-tick callback: `(countdown_id, seconds_left, ticks_left)`.
pub type TickerFn = Arc<dyn Fn(&CountdownId, u64, u64) + Send + Sync>;

/// Invoked once when a countdown runs all of its phases.
pub type CompletionFn = Box<dyn FnOnce(CountdownId, DateTime<Utc>) + Send>;

/// Invoked once when a countdown is cancelled before finishing.
pub type CancelFn = Box<dyn FnOnce(CountdownId) + Send>;

/// One timed step of a countdown.
///
/// Immutable once built; cloning shares the ticker.
#[derive(Clone)]
pub struct Phase {
    duration: Duration,
    ticker: TickerFn,
}

impl Phase {
    /// Creates a phase that ticks for `duration`, calling `ticker` on every tick.
    pub fn new<F>(duration: Duration, ticker: F) -> Self
    where
        F: Fn(&CountdownId, u64, u64) + Send + Sync + 'static,
    {
        Self {
            duration,
            ticker: Arc::new(ticker),
        }
    }

    /// Creates a phase from an already shared ticker.
    #[must_use]
    pub fn from_ticker(duration: Duration, ticker: TickerFn) -> Self {
        Self { duration, ticker }
    }

    /// Creates a phase whose ticks do nothing; useful as a plain delay.
    #[must_use]
    pub fn silent(duration: Duration) -> Self {
        Self::new(duration, |_, _, _| {})
    }

    /// Returns the phase duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the shared ticker.
    #[must_use]
    pub const fn ticker(&self) -> &TickerFn {
        &self.ticker
    }

    /// Invokes the ticker.
    pub fn tick(&self, id: &CountdownId, seconds_left: u64, ticks_left: u64) {
        (self.ticker)(id, seconds_left, ticks_left);
    }
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Sum of all phase durations, saturating on overflow.
#[must_use]
pub fn total_duration(phases: &[Phase]) -> Duration {
    phases
        .iter()
        .fold(Duration::ZERO, |acc, p| acc.saturating_add(p.duration()))
}
