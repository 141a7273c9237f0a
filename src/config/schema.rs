//! Countdown definition file schema
//!
//! Durations stay as strings after deserialization so that validation can
//! report every malformed value with its path instead of failing on the
//! first one. [`parse_duration`] turns them into [`Duration`]s.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::countdown::alert::AlertMapper;
use crate::countdown::tick::TickRate;
use crate::countdown::types::{CountdownId, Phase};
use crate::error::ConfigError;

/// Default lifecycle event buffer for broadcast subscribers.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Placeholder replaced with the whole seconds left in `announce` templates.
pub const SECONDS_PLACEHOLDER: &str = "{seconds}";

/// Receives every message produced by a configured countdown.
pub type MessageSink = Arc<dyn Fn(&CountdownId, &str) + Send + Sync>;

/// Root of a countdown definitions file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TickdownConfig {
    /// Runtime settings
    #[serde(default)]
    pub settings: Settings,

    /// Countdowns started by `tickdown run`
    #[serde(default)]
    pub countdowns: Vec<CountdownDefinition>,
}

/// Global runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Tick granularity, e.g. `"50ms"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick: Option<String>,

    /// Capacity of the lifecycle event broadcast buffer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_buffer: Option<usize>,
}

impl Settings {
    /// Resolves the configured tick rate, defaulting to 50ms.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `tick` does not parse or is
    /// outside `0 < tick <= 1s`.
    pub fn tick_rate(&self) -> Result<TickRate, ConfigError> {
        let Some(raw) = &self.tick else {
            return Ok(TickRate::default());
        };
        let granularity = parse_duration("settings.tick", raw)?;
        TickRate::new(granularity).map_err(|e| ConfigError::InvalidValue {
            field: "settings.tick".to_string(),
            value: raw.clone(),
            expected: e.to_string(),
        })
    }

    /// Event buffer capacity, defaulting to [`DEFAULT_EVENT_BUFFER`].
    #[must_use]
    pub fn event_buffer(&self) -> usize {
        self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER)
    }
}

/// One countdown: an id and its ordered phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountdownDefinition {
    /// Countdown id; unique within the file
    pub id: String,

    /// Phases, run in order
    #[serde(default)]
    pub phases: Vec<PhaseDefinition>,

    /// Message emitted when every phase has run out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<String>,

    /// Message emitted when the countdown is cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_cancel: Option<String>,
}

/// One timed phase of a countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseDefinition {
    /// Phase length, e.g. `"1m 30s"`
    pub duration: String,

    /// Remaining time to message, e.g. `"10s": "ten seconds left"`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub alerts: IndexMap<String, String>,

    /// Message emitted on every whole second, with `{seconds}` substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<String>,
}

impl CountdownDefinition {
    /// Countdown id as a runtime key.
    #[must_use]
    pub fn countdown_id(&self) -> CountdownId {
        CountdownId::new(self.id.as_str())
    }

    /// Builds runtime phases whose tickers deliver alerts and announcements
    /// to `sink`.
    ///
    /// Alerts and announcements fire on the tick that lands on a whole
    /// second, so each fires once per second rather than once per tick.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for any duration that does not
    /// parse.
    pub fn build_phases(&self, rate: TickRate, sink: &MessageSink) -> Result<Vec<Phase>, ConfigError> {
        self.phases
            .iter()
            .enumerate()
            .map(|(index, phase)| phase.build(&format!("countdowns.{}.phases[{index}]", self.id), rate, sink))
            .collect()
    }
}

impl PhaseDefinition {
    fn build(&self, path: &str, rate: TickRate, sink: &MessageSink) -> Result<Phase, ConfigError> {
        let duration = parse_duration(&format!("{path}.duration"), &self.duration)?;

        let mut alerts = Vec::with_capacity(self.alerts.len());
        for (key, message) in &self.alerts {
            let at = parse_duration(&format!("{path}.alerts.{key}"), key)?;
            let sink = Arc::clone(sink);
            let message = message.clone();
            alerts.push((at, move |id: &CountdownId| sink(id, &message)));
        }
        let alert_ticker = AlertMapper::from_durations(alerts).into_edge_ticker(rate.ticks_per_second());

        let Some(template) = self.announce.clone() else {
            return Ok(Phase::from_ticker(duration, alert_ticker));
        };
        let sink = Arc::clone(sink);
        let per_second = rate.ticks_per_second().max(1);
        Ok(Phase::new(duration, move |id, seconds_left, ticks_left| {
            alert_ticker(id, seconds_left, ticks_left);
            if ticks_left % per_second == 0 {
                sink(id, &render_announcement(&template, seconds_left));
            }
        }))
    }
}

/// Substitutes `seconds_left` into an `announce` template.
#[must_use]
pub fn render_announcement(template: &str, seconds_left: u64) -> String {
    template.replace(SECONDS_PLACEHOLDER, &seconds_left.to_string())
}

/// Parses a human-readable duration such as `"90s"`, `"1m 30s"` or `"250ms"`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming `field` when `value` is not a
/// valid duration.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration like \"90s\" or \"1m 30s\" ({e})"),
    })
}
