//! Single-phase driver
//!
//! Converts a phase duration into a tick budget, feeds the ticker once per
//! tick, and parks the calling task until the budget reaches zero or the
//! countdown's cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::CountdownError;
use crate::observability::metrics;

use super::contain::guarded;
use super::tick::TickSource;
use super::types::{CountdownId, Phase};

/// Drives one phase at a time on a shared [`TickSource`].
#[derive(Clone)]
pub struct PhaseRunner {
    ticks: Arc<dyn TickSource>,
}

impl PhaseRunner {
    /// Creates a runner ticking on `ticks`.
    #[must_use]
    pub fn new(ticks: Arc<dyn TickSource>) -> Self {
        Self { ticks }
    }

    /// Runs `phase` to completion.
    ///
    /// Each tick decrements the remaining budget before the ticker sees it, so
    /// a phase of `n` ticks calls its ticker `n` times with `ticks_left` going
    /// `n - 1, ..., 0`. A phase shorter than one tick calls its ticker exactly
    /// once with `(0, 0)`.
    ///
    /// # Errors
    ///
    /// Returns [`CountdownError::Interrupted`] when `cancel` fires before the
    /// phase runs out, and [`CountdownError::TickerPanicked`] when the ticker
    /// panics. Ticks already delivered are not rolled back.
    pub async fn run(
        &self,
        id: &CountdownId,
        phase: &Phase,
        cancel: &CancellationToken,
    ) -> Result<(), CountdownError> {
        if cancel.is_cancelled() {
            return Err(CountdownError::Interrupted);
        }

        let rate = self.ticks.rate();
        let mut remaining = rate.ticks_in(phase.duration());
        let (done_tx, done_rx) = oneshot::channel::<Result<(), CountdownError>>();
        let mut done_tx = Some(done_tx);

        let tick_id = id.clone();
        let tick_phase = phase.clone();
        let guard = cancel.clone();
        let task = Box::new(move || {
            // Late ticks after completion or cancellation must not reach the ticker.
            if done_tx.is_none() || guard.is_cancelled() {
                return;
            }
            remaining = remaining.saturating_sub(1);
            metrics::record_tick();
            let ticked = guarded(&tick_id, "ticker", || {
                tick_phase.tick(&tick_id, rate.seconds_in(remaining), remaining);
            });
            let outcome = match (ticked, remaining) {
                (false, _) => Err(CountdownError::TickerPanicked),
                (true, 0) => Ok(()),
                (true, _) => return,
            };
            if let Some(tx) = done_tx.take() {
                let _ = tx.send(outcome);
            }
        });

        trace!(countdown_id = %id, ticks = rate.ticks_in(phase.duration()), "scheduling phase ticks");
        let handle = self
            .ticks
            .schedule_repeating(task, Duration::ZERO, rate.granularity());

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CountdownError::Interrupted),
            done = done_rx => match done {
                Ok(result) => result,
                Err(_) => {
                    // The tick source dropped our task; nothing can finish this phase now.
                    warn!(countdown_id = %id, "tick source stopped before phase completed; waiting for cancellation");
                    cancel.cancelled().await;
                    Err(CountdownError::Interrupted)
                }
            },
        };

        handle.cancel();
        outcome
    }
}

impl std::fmt::Debug for PhaseRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRunner")
            .field("rate", &self.ticks.rate())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::tick::{IntervalTickSource, TickRate};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn runner() -> PhaseRunner {
        PhaseRunner::new(Arc::new(IntervalTickSource::current(TickRate::default())))
    }

    fn recording_phase(duration: Duration) -> (Phase, Arc<Mutex<Vec<(u64, u64)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let phase = Phase::new(duration, move |_, secs, ticks| {
            sink.lock().unwrap().push((secs, ticks));
        });
        (phase, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_second_phase_ticks_sixty_times() {
        let (phase, calls) = recording_phase(Duration::from_secs(3));
        let cancel = CancellationToken::new();

        runner()
            .run(&CountdownId::new("evt-1"), &phase, &cancel)
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 60);
        assert_eq!(calls.first(), Some(&(2, 59)));
        assert_eq!(calls.last(), Some(&(0, 0)));
        for (secs, ticks) in calls.iter() {
            assert_eq!(*secs, ticks / 20);
        }
        for pair in calls.windows(2) {
            assert!(pair[1].1 < pair[0].1, "ticks_left must strictly decrease");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_phase_ticks_once() {
        let (phase, calls) = recording_phase(Duration::ZERO);
        let cancel = CancellationToken::new();

        runner()
            .run(&CountdownId::new("zero"), &phase, &cancel)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![(0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_tick_phase_ticks_once() {
        let (phase, calls) = recording_phase(Duration::from_millis(20));
        let cancel = CancellationToken::new();

        runner()
            .run(&CountdownId::new("short"), &phase, &cancel)
            .await
            .unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_takes_its_duration() {
        let phase = Phase::silent(Duration::from_secs(2));
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        runner()
            .run(&CountdownId::new("timed"), &phase, &cancel)
            .await
            .unwrap();

        // 40 ticks, the first at t=0
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1950), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_wait_early() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&count);
        let phase = Phase::new(Duration::from_secs(60), move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = runner()
            .run(&CountdownId::new("long"), &phase, &cancel)
            .await;

        assert_eq!(result, Err(CountdownError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(1));

        let delivered = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), delivered, "no ticks after cancel");
        assert!(delivered <= 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_ticker_ends_phase() {
        let count = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&count);
        let phase = Phase::new(Duration::from_secs(1), move |_, _, ticks| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_ne!(ticks, 10, "ticker blew up");
        });
        let cancel = CancellationToken::new();

        let result = runner()
            .run(&CountdownId::new("fragile"), &phase, &cancel)
            .await;

        assert_eq!(result, Err(CountdownError::TickerPanicked));
        // 19 down to 10
        assert_eq!(count.load(Ordering::SeqCst), 10);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10, "no ticks after the panic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_token_skips_phase() {
        let (phase, calls) = recording_phase(Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner()
            .run(&CountdownId::new("never"), &phase, &cancel)
            .await;

        assert_eq!(result, Err(CountdownError::Interrupted));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_debug_output() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let debug = format!("{:?}", runner());
        assert!(debug.contains("PhaseRunner"));
    }
}
