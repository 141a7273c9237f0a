//! `validate` command.

use crate::cli::args::ValidateArgs;
use crate::config::ConfigLoader;
use crate::error::{ConfigError, Severity, TickdownError, ValidationIssue};

/// Loads and validates each file, logging warnings.
///
/// With `--strict`, warnings fail validation.
///
/// # Errors
///
/// Returns the first file's load or validation error.
pub fn validate(args: &ValidateArgs) -> Result<(), TickdownError> {
    let loader = ConfigLoader::default();

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating countdown definitions");
        let load_result = loader.load(path)?;

        for warning in &load_result.warnings {
            tracing::warn!(
                location = warning.location.as_deref().unwrap_or("<unknown>"),
                "{}",
                warning.message
            );
        }

        if args.strict && !load_result.warnings.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: load_result
                    .warnings
                    .iter()
                    .map(|w| ValidationIssue {
                        path: w.location.clone().unwrap_or_default(),
                        message: w.message.clone(),
                        severity: Severity::Warning,
                    })
                    .collect(),
            }
            .into());
        }

        tracing::info!(
            file = %path.display(),
            countdowns = load_result.config.countdowns.len(),
            "definitions valid"
        );
    }

    Ok(())
}
