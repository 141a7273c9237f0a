//! Logging initialization for `tickdown`.
//!
//! `tracing` to stderr, human or flattened JSON. Verbosity scopes to this
//! crate's targets; `TICKDOWN_LOG_LEVEL` replaces the filter wholesale.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Environment variable holding a full `tracing` filter.
pub const LOG_LEVEL_ENV: &str = "TICKDOWN_LOG_LEVEL";

/// Level for this crate's own targets at a given `-v` count.
///
/// Saturates at `trace`.
#[must_use]
pub const fn crate_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter used when [`LOG_LEVEL_ENV`] is unset.
///
/// `-v` only raises `tickdown` targets; tokio, metrics and other
/// dependencies stay at `warn` until `-vvv`.
#[must_use]
pub fn default_directives(verbosity: u8) -> String {
    let deps = if verbosity >= 3 { "debug" } else { "warn" };
    format!(
        "{deps},{}={}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        crate_level(verbosity)
    )
}

/// Installs the global subscriber on stderr.
///
/// [`LOG_LEVEL_ENV`] wins over `verbosity`. Later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));
    let ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr);
    // Countdown ids travel as fields, so JSON lines stay flat.
    let _ = match format {
        LogFormat::Human => builder.with_ansi(ansi).try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn color_choice_default_is_auto() {
        assert_eq!(ColorChoice::default(), ColorChoice::Auto);
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn crate_level_saturates() {
        assert_eq!(crate_level(0), "warn");
        assert_eq!(crate_level(2), "debug");
        assert_eq!(crate_level(255), "trace");
    }

    #[test]
    fn verbosity_targets_this_crate_only() {
        assert_eq!(default_directives(0), "warn,tickdown=warn");
        assert_eq!(default_directives(1), "warn,tickdown=info");
        assert_eq!(default_directives(2), "warn,tickdown=debug");
        assert_eq!(default_directives(3), "debug,tickdown=trace");
    }

    #[test]
    fn default_directives_parse() {
        for verbosity in 0..4 {
            assert!(EnvFilter::try_new(default_directives(verbosity)).is_ok());
        }
    }
}
