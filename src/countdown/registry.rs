//! Countdown registry and dispatcher
//!
//! Maps countdown ids to their running tasks, enforces one countdown per id,
//! and wraps each countdown's execution in lifecycle notifications.
//!
//! The entry in the map is the single arbiter between natural completion and
//! cancellation: whichever path removes it owns the terminal notifications,
//! so a countdown never reports both `Finish` and `Cancel`, and never neither.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::CountdownError;
use crate::observability::events::{LifecycleEvent, NotificationBus};
use crate::observability::metrics;

use super::contain::guarded;
use super::engine::CountdownEngine;
use super::tick::TickSource;
use super::types::{CancelFn, CompletionFn, CountdownId, Phase, total_duration};

/// Registry entry for one in-flight countdown.
struct CountdownHandle {
    /// Background task running the phase sequence (detached on drop)
    task: JoinHandle<()>,
    /// Releases the current phase wait when cancelled
    cancel: CancellationToken,
    /// Projected finish instant
    end_time: Option<DateTime<Utc>>,
    /// Taken exactly once by `cancel`
    on_cancel: Mutex<Option<CancelFn>>,
    /// Held by `start` until `Start` is published
    announced: Arc<Mutex<()>>,
    /// Distinguishes this countdown from later ones reusing the id
    generation: u64,
}

impl CountdownHandle {
    /// Blocks until `start` has published this countdown's `Start`.
    fn wait_announced(&self) {
        drop(self.announced.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn take_on_cancel(&self) -> Option<CancelFn> {
        self.on_cancel.lock().ok().and_then(|mut slot| slot.take())
    }
}

struct Inner {
    countdowns: DashMap<CountdownId, CountdownHandle>,
    engine: CountdownEngine,
    ticks: Arc<dyn TickSource>,
    bus: Arc<dyn NotificationBus>,
    runtime: Handle,
    generation: AtomicU64,
}

impl Inner {
    async fn drive(
        self: Arc<Self>,
        id: CountdownId,
        phases: Vec<Phase>,
        generation: u64,
        cancel: CancellationToken,
        armed: oneshot::Receiver<()>,
        on_complete: CompletionFn,
    ) {
        // Hold off until `start` has published `Start`.
        let _ = armed.await;

        match self.engine.run_all(&id, &phases, &cancel).await {
            Ok(()) => self.complete(id, generation, on_complete),
            Err(CountdownError::Interrupted) => {
                debug!(countdown_id = %id, "countdown interrupted");
            }
            Err(error) => {
                warn!(countdown_id = %id, %error, "countdown failed; cancelling");
                if let Some((key, handle)) = self
                    .countdowns
                    .remove_if(&id, |_, entry| entry.generation == generation)
                {
                    self.retire(key, &handle);
                }
            }
        }
    }

    /// Terminal path for an entry already removed from the map.
    fn retire(&self, key: CountdownId, handle: &CountdownHandle) {
        metrics::set_active(self.countdowns.len());

        handle.wait_announced();
        handle.cancel.cancel();
        if let Some(on_cancel) = handle.take_on_cancel() {
            let callback_id = key.clone();
            guarded(&key, "on_cancel", move || on_cancel(callback_id));
        }

        info!(countdown_id = %key, "countdown cancelled");
        metrics::record_cancelled();
        self.bus.publish(LifecycleEvent::cancel(key.clone()));
        self.bus.publish(LifecycleEvent::close(key));
    }

    fn complete(&self, id: CountdownId, generation: u64, on_complete: CompletionFn) {
        if self
            .countdowns
            .remove_if(&id, |_, entry| entry.generation == generation)
            .is_none()
        {
            debug!(countdown_id = %id, "completion lost to cancellation");
            return;
        }
        metrics::set_active(self.countdowns.len());

        let finished_at = Utc::now();
        let callback_id = id.clone();
        self.ticks.run_task(Box::new(move || {
            let log_id = callback_id.clone();
            guarded(&log_id, "on_complete", move || on_complete(callback_id, finished_at));
        }));

        info!(countdown_id = %id, "countdown finished");
        metrics::record_finished();
        self.bus
            .publish(LifecycleEvent::finish(id.clone(), finished_at));
        self.bus.publish(LifecycleEvent::close(id));
    }
}

/// Registry of running countdowns.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct CountdownRegistry {
    inner: Arc<Inner>,
}

impl CountdownRegistry {
    /// Creates a registry whose countdown tasks run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(ticks: Arc<dyn TickSource>, bus: Arc<dyn NotificationBus>) -> Self {
        Self::with_runtime(ticks, bus, Handle::current())
    }

    /// Creates a registry whose countdown tasks run on `runtime`.
    ///
    /// The registry can then be driven from threads outside the runtime.
    #[must_use]
    pub fn with_runtime(
        ticks: Arc<dyn TickSource>,
        bus: Arc<dyn NotificationBus>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                countdowns: DashMap::new(),
                engine: CountdownEngine::new(Arc::clone(&ticks)),
                ticks,
                bus,
                runtime,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Starts a phased countdown unless one with the same id is in flight.
    ///
    /// The entry is registered before its task can make progress, so a second
    /// `start` racing this one is always a no-op. `on_complete` runs on the
    /// tick source's host context after the last phase; `on_cancel` runs
    /// inside [`cancel`](Self::cancel).
    ///
    /// A ticker that panics ends the countdown as if it were cancelled:
    /// `on_cancel` runs, then `Cancel` and `Close` are published.
    ///
    /// `Start` is published from the calling thread; a bus that calls back
    /// into [`cancel`](Self::cancel) for the same id from `publish` deadlocks.
    ///
    /// Returns `true` if a new countdown was registered.
    pub fn start<C, X>(
        &self,
        id: impl Into<CountdownId>,
        phases: Vec<Phase>,
        on_complete: C,
        on_cancel: X,
    ) -> bool
    where
        C: FnOnce(CountdownId, DateTime<Utc>) + Send + 'static,
        X: FnOnce(CountdownId) + Send + 'static,
    {
        let id = id.into();
        let cancel = CancellationToken::new();
        let (arm_tx, arm_rx) = oneshot::channel();
        let announced = Arc::new(Mutex::new(()));
        let announcing = announced.lock().unwrap_or_else(PoisonError::into_inner);

        match self.inner.countdowns.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!(countdown_id = %id, "countdown already running; start ignored");
                return false;
            }
            Entry::Vacant(slot) => {
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
                let end_time = projected_end(total_duration(&phases));
                let task = self.inner.runtime.spawn(Arc::clone(&self.inner).drive(
                    id.clone(),
                    phases,
                    generation,
                    cancel.clone(),
                    arm_rx,
                    Box::new(on_complete),
                ));
                slot.insert(CountdownHandle {
                    task,
                    cancel: cancel.clone(),
                    end_time,
                    on_cancel: Mutex::new(Some(Box::new(on_cancel))),
                    announced: Arc::clone(&announced),
                    generation,
                });
            }
        }
        metrics::set_active(self.inner.countdowns.len());
        metrics::record_started();

        info!(countdown_id = %id, "countdown started");
        self.inner.bus.publish(LifecycleEvent::start(id));
        drop(announcing);
        let _ = arm_tx.send(());
        true
    }

    /// Cancels the countdown registered under `id`.
    ///
    /// Releases its current phase wait, runs its cancel callback, then
    /// publishes `Cancel` and `Close`. Unknown ids are a no-op. A panicking
    /// cancel callback is logged and does not stop the notifications.
    ///
    /// Returns `true` if a countdown was cancelled.
    pub fn cancel(&self, id: &str) -> bool {
        let Some((key, handle)) = self.inner.countdowns.remove(id) else {
            trace!(countdown_id = id, "no countdown to cancel");
            return false;
        };
        self.inner.retire(key, &handle);
        true
    }

    /// Cancels every registered countdown.
    ///
    /// Returns the number of countdowns cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<CountdownId> = self
            .inner
            .countdowns
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter().filter(|id| self.cancel(id.as_str())).count()
    }

    /// Returns whether a countdown with `id` is pending or running.
    #[must_use]
    pub fn has_countdown(&self, id: &str) -> bool {
        self.inner.countdowns.contains_key(id)
    }

    /// Projected finish instant of the countdown registered under `id`.
    #[must_use]
    pub fn end_time(&self, id: &str) -> Option<DateTime<Utc>> {
        self.inner
            .countdowns
            .get(id)
            .and_then(|entry| entry.end_time)
    }

    /// Time left until the projected finish, saturating at zero.
    #[must_use]
    pub fn remaining(&self, id: &str) -> Option<Duration> {
        self.end_time(id)
            .map(|end| (end - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Snapshot of the ids currently in flight.
    #[must_use]
    pub fn active_ids(&self) -> Vec<CountdownId> {
        let mut ids: Vec<CountdownId> = self
            .inner
            .countdowns
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of countdowns in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.countdowns.len()
    }

    /// Returns `true` if no countdown is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.countdowns.is_empty()
    }

    /// Returns whether the task behind `id` has already exited.
    ///
    /// `None` when `id` is not registered.
    #[must_use]
    pub fn is_task_finished(&self, id: &str) -> Option<bool> {
        self.inner
            .countdowns
            .get(id)
            .map(|entry| entry.task.is_finished())
    }
}

fn projected_end(total: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(total)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
}

impl std::fmt::Debug for CountdownRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownRegistry")
            .field("active", &self.inner.countdowns.len())
            .field("rate", &self.inner.ticks.rate())
            .finish_non_exhaustive()
    }
}
