//! Error types for `tickdown`
//!
//! Countdown operations themselves are idempotent and surface no errors to
//! callers; the types here cover the interrupted-wait signal used inside a
//! countdown's own task, tick-rate construction, configuration loading and
//! the binary's exit codes.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `tickdown` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Countdown runtime error (invalid tick rate)
    pub const COUNTDOWN_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `tickdown` operations.
#[derive(Debug, Error)]
pub enum TickdownError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Countdown runtime error
    #[error(transparent)]
    Countdown(#[from] CountdownError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Metrics recorder could not be installed
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl TickdownError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Countdown(CountdownError::Interrupted) => ExitCode::INTERRUPTED,
            Self::Countdown(_) => ExitCode::COUNTDOWN_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Metrics(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Countdown Errors
// ============================================================================

/// Errors raised while driving a countdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountdownError {
    /// The phase wait was released by cancellation before the phase ran out.
    ///
    /// Recovered inside the countdown's own task; never reaches `cancel` callers.
    #[error("countdown interrupted")]
    Interrupted,

    /// A phase ticker panicked; the countdown ends as if cancelled.
    #[error("phase ticker panicked")]
    TickerPanicked,

    /// Tick granularity must be non-zero and no longer than one second.
    #[error("invalid tick granularity {granularity:?} (expected 0 < tick <= 1s)")]
    InvalidGranularity {
        /// The rejected granularity
        granularity: Duration,
    },
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Countdown definition file loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Required environment variable is not set
    #[error("environment variable '{var}' is not set: {message}")]
    EnvVarNotSet {
        /// Variable name
        var: String,
        /// Message supplied with the `${VAR:?message}` reference
        message: String,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file too large: {size} bytes (limit: {limit})")]
    TooLarge {
        /// Actual file size in bytes
        size: usize,
        /// Configured size limit in bytes
        limit: usize,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "countdowns[0].phases[1].duration")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - the file cannot be used
    Error,
    /// Warning - suspicious but loadable
    Warning,
}

/// Result type alias for `tickdown` operations.
pub type Result<T> = std::result::Result<T, TickdownError>;
