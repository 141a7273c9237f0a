//! `run` command.
//!
//! Starts every configured countdown, prints alert and callback messages to
//! stdout, and writes lifecycle events as JSONL. Returns once every
//! countdown has both closed and run its completion or cancel callback.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::cli::args::RunArgs;
use crate::config::{ConfigLoader, CountdownDefinition, MessageSink};
use crate::countdown::{CountdownId, CountdownRegistry, IntervalTickSource, TickRate};
use crate::error::{CountdownError, TickdownError};
use crate::observability::{BroadcastBus, EventEmitter, LifecycleEvent, NotificationBus, init_metrics};

/// Runs the countdowns in `args.config` until all of them close.
///
/// Ctrl+C or `--cancel-after` cancels whatever is still running.
///
/// # Errors
///
/// Returns an error if the file fails to load, the events file or metrics
/// listener cannot be opened, or the run was interrupted.
pub async fn run(args: &RunArgs) -> Result<(), TickdownError> {
    let load_result = ConfigLoader::default().load(&args.config)?;
    for warning in &load_result.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    let config = load_result.config;

    if args.metrics_port.is_some() {
        init_metrics(args.metrics_port)?;
    }

    let rate = config.settings.tick_rate()?;
    let emitter = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    });
    let subscribers = BroadcastBus::new(config.settings.event_buffer());
    let mut events = subscribers.subscribe();

    let journal = Arc::clone(&emitter);
    let bus = move |event: LifecycleEvent| {
        // Journal first, so an observed Close is already on disk.
        journal.emit(event.clone());
        subscribers.publish(event);
    };
    let registry = CountdownRegistry::new(Arc::new(IntervalTickSource::current(rate)), Arc::new(bus));

    let sink: MessageSink = Arc::new(|id: &CountdownId, message: &str| println!("{id}: {message}"));
    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel();
    let mut outstanding = Outstanding::default();

    for definition in &config.countdowns {
        start_countdown(&registry, definition, rate, &sink, &settled_tx)?;
        outstanding.track(definition.countdown_id());
    }
    info!(
        countdowns = config.countdowns.len(),
        tick = ?rate.granularity(),
        "countdowns running"
    );

    let deadline = async {
        match args.cancel_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let mut deadline_passed = false;
    let mut interrupted = false;
    let mut listen_for_interrupt = true;

    while !outstanding.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(LifecycleEvent::Close { countdown_id, .. }) => outstanding.closed(&countdown_id),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle subscriber lagged");
                    outstanding.reconcile(&registry);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(id) = settled_rx.recv() => outstanding.settled(&id),
            () = &mut deadline, if !deadline_passed => {
                deadline_passed = true;
                let cancelled = registry.cancel_all();
                info!(cancelled, "cancel-after elapsed");
            }
            signal = tokio::signal::ctrl_c(), if listen_for_interrupt && !interrupted => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for Ctrl+C");
                    listen_for_interrupt = false;
                    continue;
                }
                interrupted = true;
                let cancelled = registry.cancel_all();
                info!(cancelled, "interrupted; cancelling countdowns");
            }
        }
    }

    debug!(events = emitter.event_count(), "all countdowns closed");
    if interrupted {
        return Err(CountdownError::Interrupted.into());
    }
    Ok(())
}

fn start_countdown(
    registry: &CountdownRegistry,
    definition: &CountdownDefinition,
    rate: TickRate,
    sink: &MessageSink,
    settled: &mpsc::UnboundedSender<CountdownId>,
) -> Result<(), TickdownError> {
    let phases = definition.build_phases(rate, sink)?;

    let complete_sink = Arc::clone(sink);
    let complete_message = definition.on_complete.clone();
    let complete_tx = settled.clone();
    let on_complete = move |id: CountdownId, finished_at: DateTime<Utc>| {
        if let Some(message) = &complete_message {
            complete_sink(&id, message);
        }
        debug!(countdown_id = %id, %finished_at, "completion callback ran");
        let _ = complete_tx.send(id);
    };

    let cancel_sink = Arc::clone(sink);
    let cancel_message = definition.on_cancel.clone();
    let cancel_tx = settled.clone();
    let on_cancel = move |id: CountdownId| {
        if let Some(message) = &cancel_message {
            cancel_sink(&id, message);
        }
        let _ = cancel_tx.send(id);
    };

    if !registry.start(definition.countdown_id(), phases, on_complete, on_cancel) {
        warn!(countdown_id = %definition.id, "countdown already running; skipped");
    }
    Ok(())
}

/// Countdowns still owing a `Close` event or a callback.
#[derive(Debug, Default)]
struct Outstanding {
    unclosed: HashSet<CountdownId>,
    unsettled: HashSet<CountdownId>,
}

impl Outstanding {
    fn track(&mut self, id: CountdownId) {
        self.unclosed.insert(id.clone());
        self.unsettled.insert(id);
    }

    fn closed(&mut self, id: &CountdownId) {
        self.unclosed.remove(id);
    }

    fn settled(&mut self, id: &CountdownId) {
        self.unsettled.remove(id);
    }

    /// After lost events, treat anything no longer registered as closed.
    fn reconcile(&mut self, registry: &CountdownRegistry) {
        self.unclosed.retain(|id| registry.has_countdown(id.as_str()));
    }

    fn is_empty(&self) -> bool {
        self.unclosed.is_empty() && self.unsettled.is_empty()
    }
}
