//! Alert mapping
//!
//! Maps fixed remaining durations ("10 seconds to go") to actions and adapts
//! the mapping into a phase ticker. Lookup is exact on whole seconds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::types::{CountdownId, TickerFn};

/// Action fired when an alert's remaining time is reached.
pub type AlertAction<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Whole-second lookup table from remaining time to action.
pub struct AlertMapper<T> {
    seconds: HashMap<u64, AlertAction<T>>,
}

impl<T: 'static> AlertMapper<T> {
    /// Builds a mapper from `(remaining, action)` pairs.
    ///
    /// Keys are truncated to whole seconds; a later pair replaces an earlier
    /// one with the same key.
    pub fn from_durations<I, F>(alerts: I) -> Self
    where
        I: IntoIterator<Item = (Duration, F)>,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let seconds = alerts
            .into_iter()
            .map(|(remaining, action)| (remaining.as_secs(), Arc::new(action) as AlertAction<T>))
            .collect();
        Self { seconds }
    }

    /// Returns the action registered for exactly `seconds_left`, if any.
    #[must_use]
    pub fn resolve(&self, seconds_left: u64) -> Option<&AlertAction<T>> {
        self.seconds.get(&seconds_left)
    }

    /// Fires the action for `seconds_left`; a miss is a no-op.
    ///
    /// Returns whether an action ran.
    pub fn fire(&self, seconds_left: u64, value: &T) -> bool {
        self.resolve(seconds_left).is_some_and(|action| {
            action(value);
            true
        })
    }

    /// Number of registered alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    /// Returns `true` if no alerts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }
}

impl AlertMapper<CountdownId> {
    /// Adapts the mapper into a ticker that fires on every tick whose
    /// `seconds_left` matches a key.
    ///
    /// Several ticks share the same whole second, so a matching action fires
    /// once per tick in that second. Pair with [`AlertMapper::into_edge_ticker`]
    /// to fire once per second instead.
    #[must_use]
    pub fn into_ticker(self) -> TickerFn {
        Arc::new(move |id: &CountdownId, seconds_left: u64, _ticks_left: u64| {
            self.fire(seconds_left, id);
        })
    }

    /// Adapts the mapper into a ticker that fires when exactly N whole
    /// seconds remain, i.e. when `ticks_left` is a multiple of
    /// `ticks_per_second`. That is the last tick still reporting N seconds.
    #[must_use]
    pub fn into_edge_ticker(self, ticks_per_second: u64) -> TickerFn {
        let per_second = ticks_per_second.max(1);
        Arc::new(move |id: &CountdownId, seconds_left: u64, ticks_left: u64| {
            if ticks_left % per_second == 0 {
                self.fire(seconds_left, id);
            }
        })
    }
}

impl<T> std::fmt::Debug for AlertMapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.seconds.keys().copied().collect();
        keys.sort_unstable();
        f.debug_struct("AlertMapper")
            .field("seconds", &keys)
            .finish()
    }
}
