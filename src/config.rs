use chrono::DateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::basal::{BasalSegment, ScheduledBasal};
use crate::concentration;
use crate::dose::DoseEvent;
use crate::error::{EngineError, EngineResult};
use crate::profile::{ExerciseAdjustment, InsulinProfile};

/// A point in time in a scenario file: either epoch milliseconds or an
/// RFC 3339 timestamp string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Millis(i64),
    Text(String),
}

impl TimeSpec {
    pub fn to_millis(&self) -> EngineResult<i64> {
        match self {
            TimeSpec::Millis(ms) => Ok(*ms),
            TimeSpec::Text(text) => {
                let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
                    EngineError::Configuration(format!("invalid timestamp '{}': {}", text, e))
                })?;
                Ok(parsed.timestamp_millis())
            }
        }
    }
}

/// Scenario file loaded by the CLI: one insulin, a device-reported dose
/// history, an optional basal schedule, and a query grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub insulin: InsulinConfig,
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub basal: Option<Vec<BasalSegmentConfig>>,
    pub query: QueryConfig,
    #[serde(default)]
    pub adjustment: Option<ExerciseAdjustment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsulinConfig {
    pub label: String,
    pub duration_of_action_ms: i64,
    pub peak_time_ms: i64,
    #[serde(default = "default_concentration_factor")]
    pub concentration_factor: f64,
}

fn default_concentration_factor() -> f64 {
    1.0
}

fn default_valid() -> bool {
    true
}

/// Dose events as the device reports them: amounts and absolute rates are
/// in concentrated units and get normalized against the insulin's
/// concentration factor when the scenario is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventConfig {
    Bolus {
        timestamp: TimeSpec,
        amount_units: f64,
        #[serde(default = "default_valid")]
        valid: bool,
    },
    TemporaryRate {
        timestamp: TimeSpec,
        duration_ms: i64,
        rate: f64,
        is_absolute: bool,
        #[serde(default = "default_valid")]
        valid: bool,
    },
    ExtendedDose {
        timestamp: TimeSpec,
        duration_ms: i64,
        total_amount_units: f64,
        #[serde(default = "default_valid")]
        valid: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasalSegmentConfig {
    pub start: TimeSpec,
    pub units_per_hour: f64,
}

/// Evenly spaced query grid over `[start, end]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub start: TimeSpec,
    pub end: TimeSpec,
    pub step_ms: i64,
}

/// A scenario with all timestamps resolved, amounts normalized, and every
/// constituent validated, ready for the engine.
#[derive(Debug, Clone)]
pub struct ResolvedScenario {
    pub profile: InsulinProfile,
    pub events: Vec<DoseEvent>,
    pub basal: Option<ScheduledBasal>,
    pub time_points: Vec<i64>,
    pub adjustment: Option<ExerciseAdjustment>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&content)?;
        Ok(scenario)
    }

    /// Validates the scenario and converts it into engine inputs.
    pub fn resolve(&self) -> EngineResult<ResolvedScenario> {
        let profile = InsulinProfile::new(
            self.insulin.label.clone(),
            self.insulin.duration_of_action_ms,
            self.insulin.peak_time_ms,
            self.insulin.concentration_factor,
        )?;
        let factor = profile.concentration_factor();

        let mut events = Vec::with_capacity(self.events.len());
        for event in &self.events {
            events.push(event.resolve(factor)?);
        }
        events.sort_by_key(|event| event.timestamp_ms());
        for event in &events {
            event.validate()?;
        }

        let basal = match &self.basal {
            Some(segments) => {
                let mut resolved = Vec::with_capacity(segments.len());
                for segment in segments {
                    resolved.push(BasalSegment {
                        start_ms: segment.start.to_millis()?,
                        units_per_hour: segment.units_per_hour,
                    });
                }
                Some(ScheduledBasal::new(resolved)?)
            }
            None => None,
        };

        if let Some(adjustment) = &self.adjustment {
            adjustment.validate()?;
        }

        let time_points = self.query.resolve()?;
        debug!(
            "resolved scenario: {} events, {} query points, insulin {}",
            events.len(),
            time_points.len(),
            profile.label()
        );

        Ok(ResolvedScenario {
            profile,
            events,
            basal,
            time_points,
            adjustment: self.adjustment,
        })
    }
}

impl EventConfig {
    fn resolve(&self, concentration_factor: f64) -> EngineResult<DoseEvent> {
        match self {
            EventConfig::Bolus {
                timestamp,
                amount_units,
                valid,
            } => {
                let converted = concentration::to_normalized(*amount_units, concentration_factor)?;
                Ok(DoseEvent::Bolus {
                    timestamp_ms: timestamp.to_millis()?,
                    amount_units: converted.normalized,
                    valid: *valid,
                })
            }
            EventConfig::TemporaryRate {
                timestamp,
                duration_ms,
                rate,
                is_absolute,
                valid,
            } => {
                let converted =
                    concentration::to_normalized_rate(*rate, concentration_factor, *is_absolute)?;
                Ok(DoseEvent::TemporaryRate {
                    timestamp_ms: timestamp.to_millis()?,
                    duration_ms: *duration_ms,
                    rate: converted.normalized,
                    is_absolute: *is_absolute,
                    valid: *valid,
                })
            }
            EventConfig::ExtendedDose {
                timestamp,
                duration_ms,
                total_amount_units,
                valid,
            } => {
                let converted =
                    concentration::to_normalized(*total_amount_units, concentration_factor)?;
                Ok(DoseEvent::ExtendedDose {
                    timestamp_ms: timestamp.to_millis()?,
                    duration_ms: *duration_ms,
                    total_amount_units: converted.normalized,
                    valid: *valid,
                })
            }
        }
    }
}

impl QueryConfig {
    fn resolve(&self) -> EngineResult<Vec<i64>> {
        let start = self.start.to_millis()?;
        let end = self.end.to_millis()?;
        if self.step_ms <= 0 {
            return Err(EngineError::Configuration(format!(
                "query step must be positive, got {} ms",
                self.step_ms
            )));
        }
        if end < start {
            return Err(EngineError::Configuration(
                "query end must not precede query start".to_string(),
            ));
        }

        let mut points = Vec::new();
        let mut t = start;
        while t <= end {
            points.push(t);
            t += self.step_ms;
        }
        Ok(points)
    }
}
