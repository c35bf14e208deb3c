use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Immutable pharmacokinetic description of one insulin type.
///
/// Constructed only through [`InsulinProfile::new`], which enforces the
/// timing and concentration invariants. Once built, a profile is never
/// mutated; editing an insulin definition produces a new profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsulinProfile {
    label: String,
    duration_of_action_ms: i64,
    peak_time_ms: i64,
    concentration_factor: f64,
}

impl InsulinProfile {
    /// Builds a validated profile.
    ///
    /// `peak_time_ms` must lie strictly between zero and half of
    /// `duration_of_action_ms`: at `2 * peak == duration` the bi-exponential
    /// time constant degenerates (division by zero in the curve shape), so
    /// that boundary is rejected here rather than branched on at runtime.
    pub fn new(
        label: impl Into<String>,
        duration_of_action_ms: i64,
        peak_time_ms: i64,
        concentration_factor: f64,
    ) -> EngineResult<Self> {
        let label = label.into();

        if label.trim().is_empty() {
            return Err(EngineError::InvalidProfile(
                "label must be non-empty".to_string(),
            ));
        }
        if duration_of_action_ms <= 0 {
            return Err(EngineError::InvalidProfile(format!(
                "duration of action must be positive, got {} ms",
                duration_of_action_ms
            )));
        }
        if peak_time_ms <= 0 || peak_time_ms >= duration_of_action_ms {
            return Err(EngineError::InvalidProfile(format!(
                "peak time ({} ms) must lie strictly within the duration of action ({} ms)",
                peak_time_ms, duration_of_action_ms
            )));
        }
        if 2 * peak_time_ms >= duration_of_action_ms {
            return Err(EngineError::InvalidProfile(format!(
                "peak time ({} ms) must be less than half the duration of action ({} ms)",
                peak_time_ms, duration_of_action_ms
            )));
        }
        if !(concentration_factor > 0.0) || !concentration_factor.is_finite() {
            return Err(EngineError::InvalidProfile(format!(
                "concentration factor must be positive and finite, got {}",
                concentration_factor
            )));
        }

        Ok(Self {
            label,
            duration_of_action_ms,
            peak_time_ms,
            concentration_factor,
        })
    }

    /// Profile at the reference concentration (factor 1.0).
    pub fn standard(
        label: impl Into<String>,
        duration_of_action_ms: i64,
        peak_time_ms: i64,
    ) -> EngineResult<Self> {
        Self::new(label, duration_of_action_ms, peak_time_ms, 1.0)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration_of_action_ms(&self) -> i64 {
        self.duration_of_action_ms
    }

    pub fn peak_time_ms(&self) -> i64 {
        self.peak_time_ms
    }

    pub fn concentration_factor(&self) -> f64 {
        self.concentration_factor
    }

    /// True when this insulin is at the reference (standard) concentration.
    pub fn is_standard_concentration(&self) -> bool {
        self.concentration_factor == 1.0
    }

    /// Returns a new profile with duration and peak stretched by `adjustment`.
    ///
    /// The adjusted profile passes through full validation again, so an
    /// adjustment that would break the timing invariants is rejected rather
    /// than producing an unusable curve.
    pub fn adjusted(&self, adjustment: &ExerciseAdjustment) -> EngineResult<Self> {
        adjustment.validate()?;
        let duration = (self.duration_of_action_ms as f64 * adjustment.dia_multiplier).round();
        let peak = (self.peak_time_ms as f64 * adjustment.peak_multiplier).round();
        Self::new(
            self.label.clone(),
            duration as i64,
            peak as i64,
            self.concentration_factor,
        )
    }
}

/// Optional sensitivity adjustment applied to a profile before curve
/// evaluation, replacing ad hoc calculator overloads. Exercise typically
/// prolongs insulin action, so both multipliers default to 1.0 and scale the
/// profile's timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExerciseAdjustment {
    pub dia_multiplier: f64,
    pub peak_multiplier: f64,
}

impl Default for ExerciseAdjustment {
    fn default() -> Self {
        Self {
            dia_multiplier: 1.0,
            peak_multiplier: 1.0,
        }
    }
}

impl ExerciseAdjustment {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.dia_multiplier > 0.0) || !self.dia_multiplier.is_finite() {
            return Err(EngineError::Configuration(format!(
                "DIA multiplier must be positive and finite, got {}",
                self.dia_multiplier
            )));
        }
        if !(self.peak_multiplier > 0.0) || !self.peak_multiplier.is_finite() {
            return Err(EngineError::Configuration(format!(
                "peak multiplier must be positive and finite, got {}",
                self.peak_multiplier
            )));
        }
        Ok(())
    }
}
