//! `tickdown`: identifier-keyed, multi-phase countdown timers
//!
//! A countdown is an ordered list of timed phases. Each phase ticks at a fixed
//! granularity and reports the seconds left to its ticker until it runs out;
//! the next phase then starts. [`countdown::CountdownRegistry`] keeps at most
//! one countdown per id, runs each on its own task, and publishes
//! `Start`, `Finish` or `Cancel`, and `Close` notifications.

pub mod cli;
pub mod config;
pub mod countdown;
pub mod error;
pub mod observability;
