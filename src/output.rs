use log::info;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::display::{self, DoseDisplay};
use crate::engine::TimelinePoint;
use crate::error::EngineResult;
use crate::profile::InsulinProfile;

pub fn save_results<P: AsRef<Path>>(
    timeline: &[TimelinePoint],
    profile: &InsulinProfile,
    output_dir: P,
) -> EngineResult<()> {
    let output_path = output_dir.as_ref();

    save_timeline(timeline, &output_path.join("timeline.csv"))?;

    let summary = ScenarioSummary::from_timeline(timeline, profile)?;
    save_summary(&summary, &output_path.join("summary.json"))?;

    info!("Results saved to {:?}", output_path);
    Ok(())
}

fn save_timeline<P: AsRef<Path>>(timeline: &[TimelinePoint], path: P) -> EngineResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["TIME_MS", "IOB_UNITS", "ACTIVITY_UNITS_PER_MS"])?;

    for point in timeline {
        writer.write_record(&[
            point.time_ms.to_string(),
            point.iob_units.to_string(),
            point.activity_units_per_ms.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub insulin_label: String,
    pub concentration_factor: f64,
    pub n_points: usize,
    pub peak_iob: Option<DoseDisplay>,
    pub peak_iob_time_ms: Option<i64>,
    pub final_iob: Option<DoseDisplay>,
}

impl ScenarioSummary {
    pub fn from_timeline(
        timeline: &[TimelinePoint],
        profile: &InsulinProfile,
    ) -> EngineResult<Self> {
        let peak = timeline
            .iter()
            .max_by(|a, b| a.iob_units.total_cmp(&b.iob_units));

        // Peak and final IOB go through the dual-unit formatter so a
        // non-standard concentration always reports both representations.
        let peak_iob = match peak {
            Some(point) => Some(display::format_for_display(point.iob_units, profile)?),
            None => None,
        };
        let final_iob = match timeline.last() {
            Some(point) => Some(display::format_for_display(point.iob_units, profile)?),
            None => None,
        };

        Ok(Self {
            insulin_label: profile.label().to_string(),
            concentration_factor: profile.concentration_factor(),
            n_points: timeline.len(),
            peak_iob,
            peak_iob_time_ms: peak.map(|point| point.time_ms),
            final_iob,
        })
    }
}

fn save_summary<P: AsRef<Path>>(summary: &ScenarioSummary, path: P) -> EngineResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HOUR_MS: i64 = 3_600_000;
    const MIN_MS: i64 = 60_000;

    fn sample_timeline() -> Vec<TimelinePoint> {
        vec![
            TimelinePoint {
                time_ms: 0,
                iob_units: 10.0,
                activity_units_per_ms: 0.0,
            },
            TimelinePoint {
                time_ms: HOUR_MS,
                iob_units: 3.92,
                activity_units_per_ms: 1.2e-6,
            },
            TimelinePoint {
                time_ms: 2 * HOUR_MS,
                iob_units: 0.77,
                activity_units_per_ms: 4.0e-7,
            },
        ]
    }

    #[test]
    fn test_summary_reports_peak_and_final() {
        let profile = InsulinProfile::standard("rapid", 5 * HOUR_MS, 30 * MIN_MS).unwrap();
        let summary = ScenarioSummary::from_timeline(&sample_timeline(), &profile).unwrap();

        assert_eq!(summary.n_points, 3);
        assert_eq!(summary.peak_iob_time_ms, Some(0));
        let peak = summary.peak_iob.unwrap();
        assert_relative_eq!(peak.normalized_units, 10.0);
        assert!(peak.concentrated_units.is_none()); // standard concentration

        let last = summary.final_iob.unwrap();
        assert_relative_eq!(last.normalized_units, 0.77);
    }

    #[test]
    fn test_summary_dual_units_for_concentrated_insulin() {
        let profile = InsulinProfile::new("u200", 5 * HOUR_MS, 30 * MIN_MS, 2.0).unwrap();
        let summary = ScenarioSummary::from_timeline(&sample_timeline(), &profile).unwrap();

        let peak = summary.peak_iob.unwrap();
        assert_relative_eq!(peak.concentrated_units.unwrap(), 5.0);
    }

    #[test]
    fn test_summary_of_empty_timeline() {
        let profile = InsulinProfile::standard("rapid", 5 * HOUR_MS, 30 * MIN_MS).unwrap();
        let summary = ScenarioSummary::from_timeline(&[], &profile).unwrap();
        assert_eq!(summary.n_points, 0);
        assert!(summary.peak_iob.is_none());
        assert!(summary.final_iob.is_none());
    }
}
