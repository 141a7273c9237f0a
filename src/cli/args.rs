//! CLI argument definitions
//!
//! All Clap derive structs for `tickdown` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::observability::{ColorChoice, LogFormat};

/// Runs phased countdown timers from a YAML definitions file.
#[derive(Parser, Debug)]
#[command(name = "tickdown", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "TICKDOWN_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "TICKDOWN_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every countdown in a definitions file and wait for them to close.
    Run(RunArgs),

    /// Validate definitions files without running them.
    Validate(ValidateArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML definitions file.
    #[arg(env = "TICKDOWN_CONFIG")]
    pub config: PathBuf,

    /// Write lifecycle events as JSONL to this file instead of stderr.
    #[arg(long, env = "TICKDOWN_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Cancel every countdown still running after this long (e.g. `30s`).
    #[arg(long, value_parser = humantime::parse_duration)]
    pub cancel_after: Option<Duration>,

    /// Expose Prometheus metrics on `127.0.0.1:<PORT>`.
    #[arg(long, env = "TICKDOWN_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Definitions files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}
