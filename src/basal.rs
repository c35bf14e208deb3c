use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Lookup of the scheduled basal rate (normalized units/hour) at a point in
/// time. Percentage-style temporary rates are deltas against this schedule,
/// so evaluating them requires one of these from the profile-store
/// collaborator.
pub trait BasalSchedule {
    fn rate_at(&self, timestamp_ms: i64) -> f64;
}

/// Constant scheduled basal rate.
#[derive(Debug, Clone, Copy)]
pub struct FlatBasal {
    units_per_hour: f64,
}

impl FlatBasal {
    pub fn new(units_per_hour: f64) -> EngineResult<Self> {
        if !(units_per_hour >= 0.0) || !units_per_hour.is_finite() {
            return Err(EngineError::Configuration(format!(
                "basal rate must be non-negative and finite, got {}",
                units_per_hour
            )));
        }
        Ok(Self { units_per_hour })
    }
}

impl BasalSchedule for FlatBasal {
    fn rate_at(&self, _timestamp_ms: i64) -> f64 {
        self.units_per_hour
    }
}

/// One segment of a basal schedule: `units_per_hour` applies from `start_ms`
/// until the next segment begins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BasalSegment {
    pub start_ms: i64,
    pub units_per_hour: f64,
}

/// Piecewise-constant scheduled basal, last-segment-wins lookup. Queries
/// before the first segment resolve to the first segment's rate.
#[derive(Debug, Clone)]
pub struct ScheduledBasal {
    segments: Vec<BasalSegment>,
}

impl ScheduledBasal {
    pub fn new(mut segments: Vec<BasalSegment>) -> EngineResult<Self> {
        if segments.is_empty() {
            return Err(EngineError::Configuration(
                "basal schedule must contain at least one segment".to_string(),
            ));
        }
        for segment in &segments {
            if !(segment.units_per_hour >= 0.0) || !segment.units_per_hour.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "basal segment rate must be non-negative and finite, got {}",
                    segment.units_per_hour
                )));
            }
        }
        segments.sort_by_key(|segment| segment.start_ms);
        Ok(Self { segments })
    }
}

impl BasalSchedule for ScheduledBasal {
    fn rate_at(&self, timestamp_ms: i64) -> f64 {
        let mut rate = self.segments[0].units_per_hour;
        for segment in &self.segments {
            if segment.start_ms <= timestamp_ms {
                rate = segment.units_per_hour;
            } else {
                break;
            }
        }
        rate
    }
}
