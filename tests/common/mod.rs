//! Shared integration-test helpers: event recording buses and a spawner for
//! the `tickdown` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickdown::countdown::{CountdownId, CountdownRegistry, IntervalTickSource, TickRate};
use tickdown::observability::{LifecycleEvent, NotificationBus};

/// Default timeout for waiting on countdown outcomes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared log of published lifecycle events.
pub type EventLog = Arc<Mutex<Vec<LifecycleEvent>>>;

/// Returns a bus that appends every event to the returned log.
pub fn recording_bus() -> (EventLog, Arc<dyn NotificationBus>) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let bus = Arc::new(move |event: LifecycleEvent| sink.lock().unwrap().push(event));
    (log, bus)
}

/// Registry on the current runtime at the default 50ms tick.
pub fn registry() -> (CountdownRegistry, EventLog) {
    registry_with_rate(TickRate::default())
}

/// Registry on the current runtime at `rate`.
pub fn registry_with_rate(rate: TickRate) -> (CountdownRegistry, EventLog) {
    let (log, bus) = recording_bus();
    let ticks = Arc::new(IntervalTickSource::current(rate));
    (CountdownRegistry::new(ticks, bus), log)
}

/// Event kinds published for `id`, in order.
pub fn kinds_for(log: &EventLog, id: &str) -> Vec<&'static str> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|event| event.countdown_id().as_str() == id)
        .map(LifecycleEvent::kind)
        .collect()
}

/// Number of `Close` events published so far.
pub fn closed_count(log: &EventLog) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|event| matches!(event, LifecycleEvent::Close { .. }))
        .count()
}

/// Distinct countdown ids that have published any event.
pub fn ids_seen(log: &EventLog) -> Vec<CountdownId> {
    let mut ids: Vec<CountdownId> = log
        .lock()
        .unwrap()
        .iter()
        .map(|event| event.countdown_id().clone())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Path to a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Runs the `tickdown` binary to completion with `args`.
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_tickdown"))
        .args(args)
        .env_remove("TICKDOWN_LOG_LEVEL")
        .output()
        .expect("failed to run tickdown")
}
