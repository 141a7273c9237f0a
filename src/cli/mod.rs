//! Command-line interface
//!
//! Argument parsing and command handlers for the `tickdown` binary.

pub mod args;
pub mod commands;
