use log::debug;
use serde::Serialize;

use crate::basal::BasalSchedule;
use crate::curve::ActivityCurve;
use crate::dose::{DoseContribution, DoseEvent};
use crate::error::EngineResult;
use crate::profile::{ExerciseAdjustment, InsulinProfile};

/// Aggregate IOB and activity across a set of dose events at one query time.
///
/// The profile (optionally stretched by an exercise adjustment) shapes a
/// single activity curve shared by all events; contributions are a plain
/// sum, so callers aggregating very large histories may partition the event
/// slice and sum partial results.
pub fn compute_iob(
    query_time_ms: i64,
    events: &[DoseEvent],
    profile: &InsulinProfile,
    basal: Option<&dyn BasalSchedule>,
    adjustment: Option<&ExerciseAdjustment>,
) -> EngineResult<DoseContribution> {
    let curve = effective_curve(profile, adjustment)?;

    let mut total = DoseContribution::ZERO;
    for event in events {
        total.accumulate(event.contribution(query_time_ms, &curve, basal)?);
    }
    debug!(
        "IOB at {}: {:.4} U ({} events, insulin {})",
        query_time_ms,
        total.iob_units,
        events.len(),
        profile.label()
    );
    Ok(total)
}

/// One sample of the aggregate IOB/activity curve, for visualization or
/// reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimelinePoint {
    pub time_ms: i64,
    pub iob_units: f64,
    pub activity_units_per_ms: f64,
}

/// Evaluates the aggregate at each of `time_points`.
pub fn evaluate_timeline(
    time_points: &[i64],
    events: &[DoseEvent],
    profile: &InsulinProfile,
    basal: Option<&dyn BasalSchedule>,
    adjustment: Option<&ExerciseAdjustment>,
) -> EngineResult<Vec<TimelinePoint>> {
    let curve = effective_curve(profile, adjustment)?;

    let mut points = Vec::with_capacity(time_points.len());
    for &time_ms in time_points {
        let mut total = DoseContribution::ZERO;
        for event in events {
            total.accumulate(event.contribution(time_ms, &curve, basal)?);
        }
        points.push(TimelinePoint {
            time_ms,
            iob_units: total.iob_units,
            activity_units_per_ms: total.activity_units_per_ms,
        });
    }
    Ok(points)
}

fn effective_curve(
    profile: &InsulinProfile,
    adjustment: Option<&ExerciseAdjustment>,
) -> EngineResult<ActivityCurve> {
    let curve = match adjustment {
        Some(adjustment) => ActivityCurve::new(&profile.adjusted(adjustment)?),
        None => ActivityCurve::new(profile),
    };
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basal::FlatBasal;
    use approx::assert_relative_eq;

    const HOUR_MS: i64 = 3_600_000;
    const MIN_MS: i64 = 60_000;

    fn reference_profile() -> InsulinProfile {
        InsulinProfile::standard("rapid", 5 * HOUR_MS, 30 * MIN_MS).unwrap()
    }

    #[test]
    fn test_aggregate_sums_events() {
        let profile = reference_profile();
        let events = vec![
            DoseEvent::Bolus {
                timestamp_ms: 0,
                amount_units: 4.0,
                valid: true,
            },
            DoseEvent::Bolus {
                timestamp_ms: 0,
                amount_units: 6.0,
                valid: true,
            },
            DoseEvent::Bolus {
                timestamp_ms: 0,
                amount_units: 100.0,
                valid: false, // priming, never counted
            },
        ];

        let total = compute_iob(0, &events, &profile, None, None).unwrap();
        assert_relative_eq!(total.iob_units, 10.0, epsilon = 1e-9);

        let later = compute_iob(HOUR_MS, &events, &profile, None, None).unwrap();
        assert_relative_eq!(later.iob_units, 3.92, epsilon = 0.05);
    }

    #[test]
    fn test_empty_history_is_zero() {
        let profile = reference_profile();
        let total = compute_iob(HOUR_MS, &[], &profile, None, None).unwrap();
        assert_eq!(total, DoseContribution::ZERO);
    }

    #[test]
    fn test_exercise_adjustment_slows_decay() {
        let profile = reference_profile();
        let events = vec![DoseEvent::Bolus {
            timestamp_ms: 0,
            amount_units: 10.0,
            valid: true,
        }];
        let adjustment = ExerciseAdjustment {
            dia_multiplier: 1.5,
            peak_multiplier: 1.5,
        };

        let plain = compute_iob(2 * HOUR_MS, &events, &profile, None, None).unwrap();
        let adjusted =
            compute_iob(2 * HOUR_MS, &events, &profile, None, Some(&adjustment)).unwrap();
        assert!(adjusted.iob_units > plain.iob_units);
    }

    #[test]
    fn test_timeline_matches_pointwise_queries() {
        let profile = reference_profile();
        let basal = FlatBasal::new(1.0).unwrap();
        let events = vec![
            DoseEvent::Bolus {
                timestamp_ms: 0,
                amount_units: 3.0,
                valid: true,
            },
            DoseEvent::TemporaryRate {
                timestamp_ms: 30 * MIN_MS,
                duration_ms: HOUR_MS,
                rate: 150.0,
                is_absolute: false,
                valid: true,
            },
        ];
        let times: Vec<i64> = (0..=6).map(|h| h * HOUR_MS).collect();

        let timeline =
            evaluate_timeline(&times, &events, &profile, Some(&basal), None).unwrap();
        assert_eq!(timeline.len(), times.len());

        for point in &timeline {
            let single =
                compute_iob(point.time_ms, &events, &profile, Some(&basal), None).unwrap();
            assert_relative_eq!(point.iob_units, single.iob_units, epsilon = 1e-12);
            assert_relative_eq!(
                point.activity_units_per_ms,
                single.activity_units_per_ms,
                epsilon = 1e-12
            );
        }
    }
}
