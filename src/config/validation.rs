//! Countdown definition validation
//!
//! Runs on the deserialized [`TickdownConfig`] and collects every problem
//! instead of stopping at the first.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{
    CountdownDefinition, PhaseDefinition, SECONDS_PLACEHOLDER, TickdownConfig, parse_duration,
};
use crate::countdown::tick::TickRate;
use crate::error::{Severity, ValidationIssue};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every error and warning found.
    pub fn validate(&mut self, config: &TickdownConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        let rate = self.validate_settings(config);

        if config.countdowns.is_empty() {
            self.add_warning("countdowns", "No countdowns defined; nothing will run");
        }
        if config.countdowns.len() > limits.max_countdowns {
            self.add_error(
                "countdowns",
                format!(
                    "Too many countdowns: {} (limit {})",
                    config.countdowns.len(),
                    limits.max_countdowns
                ),
            );
        }

        let mut seen = HashSet::new();
        for (idx, countdown) in config.countdowns.iter().enumerate() {
            let path = format!("countdowns[{idx}]");
            if !countdown.id.is_empty() && !seen.insert(countdown.id.as_str()) {
                self.add_error(
                    format!("{path}.id"),
                    format!("Duplicate countdown id '{}'", countdown.id),
                );
            }
            self.validate_countdown(countdown, &path, rate, limits);
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    /// Validates settings, returning the tick rate to check phases against.
    ///
    /// Falls back to the default rate when `tick` is invalid so phase checks
    /// still run.
    fn validate_settings(&mut self, config: &TickdownConfig) -> TickRate {
        let rate = match config.settings.tick_rate() {
            Ok(rate) => rate,
            Err(e) => {
                self.add_error("settings.tick", e.to_string());
                TickRate::default()
            }
        };
        if config.settings.event_buffer == Some(0) {
            self.add_error("settings.event_buffer", "Event buffer must be at least 1");
        }
        rate
    }

    fn validate_countdown(
        &mut self,
        countdown: &CountdownDefinition,
        path: &str,
        rate: TickRate,
        limits: &ConfigLimits,
    ) {
        if countdown.id.trim().is_empty() {
            self.add_error(format!("{path}.id"), "Countdown id is required and cannot be empty");
        }

        if countdown.phases.is_empty() {
            self.add_error(
                format!("{path}.phases"),
                "Countdown needs at least one phase",
            );
        }
        if countdown.phases.len() > limits.max_phases {
            self.add_error(
                format!("{path}.phases"),
                format!(
                    "Too many phases: {} (limit {})",
                    countdown.phases.len(),
                    limits.max_phases
                ),
            );
        }

        for (idx, phase) in countdown.phases.iter().enumerate() {
            self.validate_phase(phase, &format!("{path}.phases[{idx}]"), rate);
        }
    }

    fn validate_phase(&mut self, phase: &PhaseDefinition, path: &str, rate: TickRate) {
        let duration_path = format!("{path}.duration");
        let duration = match parse_duration(&duration_path, &phase.duration) {
            Ok(duration) => Some(duration),
            Err(e) => {
                self.add_error(duration_path.clone(), e.to_string());
                None
            }
        };

        // Highest seconds-left value the phase's ticker will ever see.
        let max_seconds = duration.map(|d| rate.seconds_in(rate.ticks_in(d).saturating_sub(1)));

        for key in phase.alerts.keys() {
            let alert_path = format!("{path}.alerts.{key}");
            let at = match parse_duration(&alert_path, key) {
                Ok(at) => at,
                Err(e) => {
                    self.add_error(alert_path, e.to_string());
                    continue;
                }
            };
            if at.subsec_nanos() != 0 {
                self.add_warning(
                    alert_path.clone(),
                    format!(
                        "Alert time is truncated to {}s; alerts match whole seconds only",
                        at.as_secs()
                    ),
                );
            }
            if let Some(max) = max_seconds
                && at.as_secs() > max
            {
                self.add_warning(
                    alert_path,
                    format!("Alert can never fire; the phase starts at {max}s remaining"),
                );
            }
        }

        if let Some(template) = &phase.announce
            && !template.contains(SECONDS_PLACEHOLDER)
        {
            self.add_warning(
                format!("{path}.announce"),
                format!("Announcement has no {SECONDS_PLACEHOLDER} placeholder"),
            );
        }

        if duration == Some(Duration::ZERO) {
            self.add_warning(duration_path, "Zero-length phase ticks exactly once");
        }
    }

    fn add_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ConfigLimits {
        ConfigLimits {
            max_countdowns: 10,
            max_phases: 5,
            max_config_size: 1024 * 1024,
        }
    }

    fn validate(yaml: &str) -> ValidationResult {
        let config: TickdownConfig = serde_yaml::from_str(yaml).unwrap();
        Validator::new().validate(&config, &limits())
    }

    fn paths(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn test_valid_config() {
        let result = validate(
            r#"
settings:
  tick: 50ms
countdowns:
  - id: tea
    phases:
      - duration: 3m
        alerts:
          "1m": one minute
        announce: "{seconds}"
"#,
        );
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_empty_config_warns() {
        let result = validate("{}");
        assert!(result.is_valid());
        assert_eq!(paths(&result.warnings), vec!["countdowns"]);
    }

    #[test]
    fn test_bad_tick_and_buffer() {
        let result = validate("settings:\n  tick: 0ms\n  event_buffer: 0\ncountdowns: []\n");
        assert!(result.has_errors());
        assert_eq!(
            paths(&result.errors),
            vec!["settings.tick", "settings.event_buffer"]
        );
    }

    #[test]
    fn test_empty_and_duplicate_ids() {
        let result = validate(
            r"
countdowns:
  - id: a
    phases: [{duration: 1s}]
  - id: a
    phases: [{duration: 1s}]
  - id: ''
    phases: [{duration: 1s}]
",
        );
        assert_eq!(paths(&result.errors), vec!["countdowns[1].id", "countdowns[2].id"]);
    }

    #[test]
    fn test_missing_phases() {
        let result = validate("countdowns:\n  - id: bare\n");
        assert_eq!(paths(&result.errors), vec!["countdowns[0].phases"]);
    }

    #[test]
    fn test_limits_enforced() {
        let phases = "[{duration: 1s}, {duration: 1s}, {duration: 1s}, {duration: 1s}, {duration: 1s}, {duration: 1s}]";
        let result = validate(&format!("countdowns:\n  - id: long\n    phases: {phases}\n"));
        assert!(
            result.errors[0].message.contains("Too many phases"),
            "{:?}",
            result.errors
        );
    }

    #[test]
    fn test_bad_durations_all_reported() {
        let result = validate(
            r#"
countdowns:
  - id: x
    phases:
      - duration: later
        alerts:
          "never": oops
      - duration: 5s
"#,
        );
        assert_eq!(
            paths(&result.errors),
            vec!["countdowns[0].phases[0].duration", "countdowns[0].phases[0].alerts.never"]
        );
    }

    #[test]
    fn test_unreachable_and_fractional_alerts_warn() {
        let result = validate(
            r#"
countdowns:
  - id: x
    phases:
      - duration: 3s
        alerts:
          "3s": too late
          "1500ms": fractional
"#,
        );
        assert!(result.is_valid());
        assert_eq!(
            paths(&result.warnings),
            vec![
                "countdowns[0].phases[0].alerts.3s",
                "countdowns[0].phases[0].alerts.1500ms"
            ]
        );
    }

    #[test]
    fn test_announce_without_placeholder_warns() {
        let result = validate(
            r"
countdowns:
  - id: x
    phases:
      - duration: 2s
        announce: tick tock
",
        );
        assert_eq!(paths(&result.warnings), vec!["countdowns[0].phases[0].announce"]);
    }

    #[test]
    fn test_zero_phase_warns() {
        let result = validate("countdowns:\n  - id: z\n    phases: [{duration: 0s}]\n");
        assert!(result.is_valid());
        assert_eq!(paths(&result.warnings), vec!["countdowns[0].phases[0].duration"]);
    }
}
