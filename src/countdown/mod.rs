//! Countdown runtime
//!
//! Phased countdowns keyed by id:
//!
//! - [`types`]: ids, phases and callback aliases
//! - [`tick`]: tick rate and the scheduling seam
//! - [`runner`]: drives one phase against a tick source
//! - [`engine`]: runs a phase sequence in order
//! - [`registry`]: one countdown per id, lifecycle notifications
//! - [`alert`]: seconds-left to action lookup usable as a ticker

pub mod alert;
mod contain;
pub mod engine;
pub mod registry;
pub mod runner;
pub mod tick;
pub mod types;

pub use alert::{AlertAction, AlertMapper};
pub use engine::CountdownEngine;
pub use registry::CountdownRegistry;
pub use runner::PhaseRunner;
pub use tick::{IntervalTickSource, TickHandle, TickRate, TickSource};
pub use types::{CancelFn, CompletionFn, CountdownId, Phase, TickerFn, total_duration};
