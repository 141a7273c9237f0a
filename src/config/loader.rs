//! Countdown definitions loader
//!
//! Pipeline:
//! 1. Size check against [`ConfigLimits`]
//! 2. Environment variable expansion on the raw text
//! 3. YAML parsing into [`TickdownConfig`]
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::TickdownConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Limits on definition files to bound resource use.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of countdowns per file.
    pub max_countdowns: usize,

    /// Maximum number of phases per countdown.
    pub max_phases: usize,

    /// Maximum file size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_countdowns: env_or("TICKDOWN_MAX_COUNTDOWNS", 1000),
            max_phases: env_or("TICKDOWN_MAX_PHASES", 100),
            max_config_size: env_or("TICKDOWN_MAX_CONFIG_SIZE", 1024 * 1024),
        }
    }
}

/// A loaded, validated definitions file.
#[derive(Debug)]
pub struct LoadResult {
    /// The frozen configuration.
    pub config: Arc<TickdownConfig>,

    /// Warnings from substitution and validation.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal problem found while loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Where it was found.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Loads countdown definition files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader enforcing `limits`.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Limits this loader enforces.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Loads and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing or unreadable
    /// - It exceeds `max_config_size`
    /// - A required environment variable is unset
    /// - YAML parsing fails
    /// - Validation finds errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                size,
                limit: self.limits.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&raw, path)
    }

    /// Loads and validates YAML already in memory; `path` is used for
    /// diagnostics only.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_str(&self, raw: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        if raw.len() > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                size: raw.len(),
                limit: self.limits.max_config_size,
            });
        }
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let mut env = EnvSubstitution::new(path);
        let expanded = env.substitute(raw)?;
        let mut warnings = env.warnings;

        let config: TickdownConfig = if expanded.trim().is_empty() {
            warnings.push(LoadWarning {
                message: "Configuration file is empty".to_string(),
                location: Some(path.display().to_string()),
            });
            TickdownConfig::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?
        };

        let result = Validator::new().validate(&config, &self.limits);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        tracing::debug!(
            path = %path.display(),
            countdowns = config.countdowns.len(),
            warnings = warnings.len(),
            "configuration loaded"
        );

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

/// `${VAR}` expansion over raw YAML text.
struct EnvSubstitution {
    source: PathBuf,
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            warnings: Vec::new(),
        }
    }

    /// Expands environment references.
    ///
    /// - `${VAR}`: value, or empty string plus a warning when unset
    /// - `${VAR:-default}`: value, or `default` when unset
    /// - `${VAR:?message}`: value, or an error carrying `message` when unset
    /// - `$$`: literal `$`
    fn substitute(&mut self, raw: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    out.push('$');
                }
                Some('{') => {
                    chars.next();
                    let reference = self.read_reference(&mut chars)?;
                    out.push_str(&self.resolve(reference)?);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }

    fn resolve(&mut self, reference: EnvReference) -> Result<String, ConfigError> {
        if let Ok(value) = std::env::var(&reference.name) {
            return Ok(value);
        }
        match reference.fallback {
            Fallback::Default(value) => Ok(value),
            Fallback::Required(message) => Err(ConfigError::EnvVarNotSet {
                var: reference.name,
                message,
            }),
            Fallback::Empty => {
                self.warnings.push(LoadWarning {
                    message: format!(
                        "Environment variable '{}' is not set, using empty string",
                        reference.name
                    ),
                    location: Some(self.source.display().to_string()),
                });
                Ok(String::new())
            }
        }
    }

    /// Reads `NAME}`, `NAME:-default}` or `NAME:?message}` after `${`.
    fn read_reference(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    ) -> Result<EnvReference, ConfigError> {
        let mut name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '}' => {
                    return Ok(EnvReference {
                        name,
                        fallback: Fallback::Empty,
                    });
                }
                ':' if matches!(chars.peek(), Some('-' | '?')) => {
                    let required = chars.next() == Some('?');
                    let value = self.read_until_close(chars, &name)?;
                    let fallback = if required {
                        Fallback::Required(value)
                    } else {
                        Fallback::Default(value)
                    };
                    return Ok(EnvReference { name, fallback });
                }
                _ => name.push(c),
            }
        }
        Err(self.unclosed(&name))
    }

    /// Reads up to the matching `}`, keeping nested braces.
    fn read_until_close(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        name: &str,
    ) -> Result<String, ConfigError> {
        let mut value = String::new();
        let mut depth = 1usize;
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }
        Err(self.unclosed(name))
    }

    fn unclosed(&self, name: &str) -> ConfigError {
        ConfigError::ParseError {
            path: self.source.clone(),
            line: None,
            message: format!("Unclosed environment variable reference: ${{{name}"),
        }
    }
}

struct EnvReference {
    name: String,
    fallback: Fallback,
}

enum Fallback {
    Empty,
    Default(String),
    Required(String),
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
