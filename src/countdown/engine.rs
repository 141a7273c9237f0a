//! Phase sequencer
//!
//! Runs the phases of one countdown strictly in order. An interrupted phase
//! stops the sequence; nothing is retried or skipped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::CountdownError;

use super::runner::PhaseRunner;
use super::tick::TickSource;
use super::types::{CountdownId, Phase};

/// Drives a countdown's phases through a [`PhaseRunner`].
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    runner: PhaseRunner,
}

impl CountdownEngine {
    /// Creates an engine ticking on `ticks`.
    #[must_use]
    pub fn new(ticks: Arc<dyn TickSource>) -> Self {
        Self {
            runner: PhaseRunner::new(ticks),
        }
    }

    /// Runs every phase in order.
    ///
    /// Returns normally once the last phase runs out; completion
    /// notification is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns the first phase error, [`CountdownError::Interrupted`] or
    /// [`CountdownError::TickerPanicked`]; later phases never start.
    pub async fn run_all(
        &self,
        id: &CountdownId,
        phases: &[Phase],
        cancel: &CancellationToken,
    ) -> Result<(), CountdownError> {
        for (index, phase) in phases.iter().enumerate() {
            debug!(countdown_id = %id, phase = index, duration = ?phase.duration(), "phase started");
            self.runner.run(id, phase, cancel).await?;
            debug!(countdown_id = %id, phase = index, "phase completed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countdown::tick::{IntervalTickSource, TickRate};
    use std::sync::Mutex;
    use std::time::Duration;

    fn engine() -> CountdownEngine {
        CountdownEngine::new(Arc::new(IntervalTickSource::current(TickRate::default())))
    }

    fn labelled(duration: Duration, label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Phase {
        let log = Arc::clone(log);
        Phase::new(duration, move |_, _, ticks| {
            if ticks == 0 {
                log.lock().unwrap().push(label);
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let phases = vec![
            labelled(Duration::from_secs(2), "prepare", &log),
            labelled(Duration::from_millis(100), "active", &log),
            labelled(Duration::from_secs(1), "cooldown", &log),
        ];

        engine()
            .run_all(&CountdownId::new("ordered"), &phases, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["prepare", "active", "cooldown"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_sequence_completes_immediately() {
        engine()
            .run_all(&CountdownId::new("empty"), &[], &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_time_is_sum_of_phases() {
        let phases = vec![
            Phase::silent(Duration::from_secs(1)),
            Phase::silent(Duration::from_secs(1)),
        ];
        let started = tokio::time::Instant::now();

        engine()
            .run_all(&CountdownId::new("sum"), &phases, &CancellationToken::new())
            .await
            .unwrap();

        // Each phase ends on its last tick, one granularity before its nominal end.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_before_next_phase() {
        let first = Arc::new(Mutex::new(0_u64));
        let second = Arc::new(Mutex::new(0_u64));
        let cancel = CancellationToken::new();

        let first_sink = Arc::clone(&first);
        let trigger = cancel.clone();
        let second_sink = Arc::clone(&second);
        let phases = vec![
            Phase::new(Duration::from_secs(5), move |_, _, _| {
                let mut n = first_sink.lock().unwrap();
                *n += 1;
                if *n == 40 {
                    trigger.cancel();
                }
            }),
            Phase::new(Duration::from_secs(5), move |_, _, _| {
                *second_sink.lock().unwrap() += 1;
            }),
        ];

        let result = engine()
            .run_all(&CountdownId::new("evt-2"), &phases, &cancel)
            .await;

        assert_eq!(result, Err(CountdownError::Interrupted));
        assert_eq!(*first.lock().unwrap(), 40);
        assert_eq!(*second.lock().unwrap(), 0);
    }
}
