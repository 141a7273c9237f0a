//! Metrics collection for `tickdown`.
//!
//! Prometheus-compatible counters for countdown lifecycle and tick volume.
//! Countdown ids are unbounded, so no metric is labelled by id.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TickdownError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `TickdownError::Metrics` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TickdownError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TickdownError::Metrics(e.to_string()))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "tickdown_countdowns_started_total",
        "Countdowns registered and scheduled"
    );
    describe_counter!(
        "tickdown_countdowns_finished_total",
        "Countdowns that ran all of their phases"
    );
    describe_counter!(
        "tickdown_countdowns_cancelled_total",
        "Countdowns cancelled before finishing"
    );
    describe_counter!("tickdown_ticks_total", "Ticks delivered to phase tickers");
    describe_gauge!(
        "tickdown_countdowns_active",
        "Countdowns currently in the registry"
    );
}

/// Records a countdown start.
pub fn record_started() {
    counter!("tickdown_countdowns_started_total").increment(1);
}

/// Records a natural completion.
pub fn record_finished() {
    counter!("tickdown_countdowns_finished_total").increment(1);
}

/// Records a cancellation.
pub fn record_cancelled() {
    counter!("tickdown_countdowns_cancelled_total").increment(1);
}

/// Records one delivered tick.
pub fn record_tick() {
    counter!("tickdown_ticks_total").increment(1);
}

/// Sets the number of in-flight countdowns.
#[allow(clippy::cast_precision_loss)]
pub fn set_active(count: usize) {
    gauge!("tickdown_countdowns_active").set(count as f64);
}
