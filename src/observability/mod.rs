//! Observability module
//!
//! Lifecycle notifications, logging and metrics for running countdowns.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{BroadcastBus, EventEmitter, LifecycleEvent, NotificationBus};
pub use logging::{ColorChoice, LogFormat, init_logging};
pub use metrics::init_metrics;
