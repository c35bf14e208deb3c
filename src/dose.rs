use serde::{Deserialize, Serialize};

use crate::basal::BasalSchedule;
use crate::curve::ActivityCurve;
use crate::error::{EngineError, EngineResult};

/// Sampling interval for spreading continuous delivery (extended doses,
/// temporary rates) into virtual micro-boluses. Tunable; 5 minutes keeps the
/// discretization error well under the regression tolerances for any peak
/// time of 30 minutes or more (halving it moves results by < 0.01 units).
pub const DISCRETIZATION_STEP_MS: i64 = 5 * 60_000;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// A single delivered-insulin record, as reported by the pump history.
///
/// Amounts and rates are in normalized units (concentration conversion
/// happens before events are built, see [`crate::concentration`]). Records
/// invalidated upstream (corrections, priming/fill entries) carry
/// `valid = false` and contribute nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoseEvent {
    Bolus {
        timestamp_ms: i64,
        amount_units: f64,
        valid: bool,
    },
    /// Time-bounded override of the scheduled basal delivery. `rate` is
    /// units/hour when `is_absolute`, otherwise a percentage of the
    /// scheduled basal (100 = unchanged).
    TemporaryRate {
        timestamp_ms: i64,
        duration_ms: i64,
        rate: f64,
        is_absolute: bool,
        valid: bool,
    },
    /// A bolus spread evenly over `duration_ms`.
    ExtendedDose {
        timestamp_ms: i64,
        duration_ms: i64,
        total_amount_units: f64,
        valid: bool,
    },
}

/// Remaining active insulin and instantaneous activity of one event at one
/// query time. Summed across events by the caller. Values are signed:
/// a percentage temporary rate below 100% is a delta against the scheduled
/// baseline and legitimately contributes negative insulin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseContribution {
    pub iob_units: f64,
    pub activity_units_per_ms: f64,
}

impl DoseContribution {
    pub const ZERO: Self = Self {
        iob_units: 0.0,
        activity_units_per_ms: 0.0,
    };

    pub fn accumulate(&mut self, other: Self) {
        self.iob_units += other.iob_units;
        self.activity_units_per_ms += other.activity_units_per_ms;
    }
}

impl DoseEvent {
    pub fn timestamp_ms(&self) -> i64 {
        match *self {
            DoseEvent::Bolus { timestamp_ms, .. }
            | DoseEvent::TemporaryRate { timestamp_ms, .. }
            | DoseEvent::ExtendedDose { timestamp_ms, .. } => timestamp_ms,
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            DoseEvent::Bolus { valid, .. }
            | DoseEvent::TemporaryRate { valid, .. }
            | DoseEvent::ExtendedDose { valid, .. } => valid,
        }
    }

    /// Checks the structural invariants of the record itself (amounts and
    /// durations non-negative, values finite). Invalidated events are not
    /// exempt: a malformed record is a data problem even when it no longer
    /// doses.
    pub fn validate(&self) -> EngineResult<()> {
        match *self {
            DoseEvent::Bolus { amount_units, .. } => {
                if !(amount_units >= 0.0) || !amount_units.is_finite() {
                    return Err(EngineError::InvalidEvent(format!(
                        "bolus amount must be non-negative and finite, got {}",
                        amount_units
                    )));
                }
            }
            DoseEvent::TemporaryRate {
                duration_ms, rate, ..
            } => {
                if duration_ms < 0 {
                    return Err(EngineError::InvalidEvent(format!(
                        "temporary rate duration must be non-negative, got {} ms",
                        duration_ms
                    )));
                }
                if !(rate >= 0.0) || !rate.is_finite() {
                    return Err(EngineError::InvalidEvent(format!(
                        "temporary rate must be non-negative and finite, got {}",
                        rate
                    )));
                }
            }
            DoseEvent::ExtendedDose {
                duration_ms,
                total_amount_units,
                ..
            } => {
                if duration_ms < 0 {
                    return Err(EngineError::InvalidEvent(format!(
                        "extended dose duration must be non-negative, got {} ms",
                        duration_ms
                    )));
                }
                if !(total_amount_units >= 0.0) || !total_amount_units.is_finite() {
                    return Err(EngineError::InvalidEvent(format!(
                        "extended dose amount must be non-negative and finite, got {}",
                        total_amount_units
                    )));
                }
            }
        }
        Ok(())
    }

    /// Remaining IOB and activity of this event at `query_time_ms`.
    ///
    /// Invalidated events short-circuit to zero before any numeric work.
    /// Percentage temporary rates need the scheduled basal; calling without
    /// a `basal` lookup in that case is an integration error and fails
    /// loudly rather than silently understating delivered insulin.
    pub fn contribution(
        &self,
        query_time_ms: i64,
        curve: &ActivityCurve,
        basal: Option<&dyn BasalSchedule>,
    ) -> EngineResult<DoseContribution> {
        if !self.is_valid() {
            return Ok(DoseContribution::ZERO);
        }
        self.validate()?;

        match *self {
            DoseEvent::Bolus {
                timestamp_ms,
                amount_units,
                ..
            } => Ok(bolus_contribution(
                query_time_ms,
                timestamp_ms,
                amount_units,
                curve,
            )),

            DoseEvent::ExtendedDose {
                timestamp_ms,
                duration_ms,
                total_amount_units,
                ..
            } => {
                // A zero-length window is an instantaneous delivery.
                if duration_ms == 0 {
                    return Ok(bolus_contribution(
                        query_time_ms,
                        timestamp_ms,
                        total_amount_units,
                        curve,
                    ));
                }
                Ok(microbolus_sum(
                    query_time_ms,
                    timestamp_ms,
                    duration_ms,
                    curve,
                    |_, step_ms| total_amount_units * step_ms / duration_ms as f64,
                ))
            }

            DoseEvent::TemporaryRate {
                timestamp_ms,
                duration_ms,
                rate,
                is_absolute,
                ..
            } => {
                if duration_ms == 0 {
                    return Ok(DoseContribution::ZERO);
                }
                if is_absolute {
                    return Ok(microbolus_sum(
                        query_time_ms,
                        timestamp_ms,
                        duration_ms,
                        curve,
                        |_, step_ms| rate * step_ms / MS_PER_HOUR,
                    ));
                }
                let basal = basal.ok_or_else(|| {
                    EngineError::MissingDependency(
                        "percentage temporary rate requires a scheduled basal lookup".to_string(),
                    )
                })?;
                // Delta against the scheduled baseline; below 100% this is
                // negative and stays negative (reduced delivery reduces IOB
                // relative to baseline).
                Ok(microbolus_sum(
                    query_time_ms,
                    timestamp_ms,
                    duration_ms,
                    curve,
                    |at_ms, step_ms| {
                        let scheduled = basal.rate_at(at_ms);
                        scheduled * (rate / 100.0 - 1.0) * step_ms / MS_PER_HOUR
                    },
                ))
            }
        }
    }
}

fn bolus_contribution(
    query_time_ms: i64,
    timestamp_ms: i64,
    amount_units: f64,
    curve: &ActivityCurve,
) -> DoseContribution {
    let elapsed = query_time_ms - timestamp_ms;
    DoseContribution {
        iob_units: amount_units * curve.iob_fraction(elapsed),
        activity_units_per_ms: amount_units * curve.activity(elapsed),
    }
}

/// Spreads a continuous delivery over `[timestamp, timestamp + duration]` as
/// micro-boluses at step midpoints and sums the ones already delivered by
/// `query_time_ms`. `amount_at` receives the micro-bolus time and the step
/// width in ms and returns the (signed) units delivered in that step.
fn microbolus_sum(
    query_time_ms: i64,
    timestamp_ms: i64,
    duration_ms: i64,
    curve: &ActivityCurve,
    amount_at: impl Fn(i64, f64) -> f64,
) -> DoseContribution {
    let steps = (duration_ms + DISCRETIZATION_STEP_MS - 1) / DISCRETIZATION_STEP_MS;
    let steps = steps.max(1);
    let step_ms = duration_ms as f64 / steps as f64;

    let mut total = DoseContribution::ZERO;
    for i in 0..steps {
        let at_ms = timestamp_ms + ((i as f64 + 0.5) * step_ms).round() as i64;
        if at_ms > query_time_ms {
            break;
        }
        let amount = amount_at(at_ms, step_ms);
        total.accumulate(bolus_contribution(query_time_ms, at_ms, amount, curve));
    }
    total
}
