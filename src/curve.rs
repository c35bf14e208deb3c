use crate::profile::InsulinProfile;

/// Bi-exponential insulin activity curve, shaped by a profile's peak time
/// (`tp`) and duration of action (`td`):
///
/// ```text
/// tau = tp * (1 - tp/td) / (1 - 2*tp/td)
/// a   = 2*tau/td
/// S   = 1 / (1 - a + (1+a) * exp(-td/tau))
/// ```
///
/// The coefficients are computed once per profile; evaluation is then a pure
/// function of elapsed time. Profile validation guarantees `1 - 2*tp/td > 0`,
/// so `tau` is always positive here.
#[derive(Debug, Clone)]
pub struct ActivityCurve {
    tau: f64,
    scale: f64,
    amplitude: f64, // a
    duration_ms: f64,
}

impl ActivityCurve {
    pub fn new(profile: &InsulinProfile) -> Self {
        let tp = profile.peak_time_ms() as f64;
        let td = profile.duration_of_action_ms() as f64;

        let tau = tp * (1.0 - tp / td) / (1.0 - 2.0 * tp / td);
        let a = 2.0 * tau / td;
        let scale = 1.0 / (1.0 - a + (1.0 + a) * (-td / tau).exp());

        Self {
            tau,
            scale,
            amplitude: a,
            duration_ms: td,
        }
    }

    /// Fraction of a dose still active `elapsed_ms` after delivery.
    ///
    /// Before delivery the full dose is still pending (fraction 1); at or
    /// beyond the duration of action it is fully expired (fraction 0). The
    /// closed form is clamped to `[0, 1]` so floating-point rounding near the
    /// boundaries can never report a fraction outside its meaning.
    pub fn iob_fraction(&self, elapsed_ms: i64) -> f64 {
        if elapsed_ms <= 0 {
            return 1.0;
        }
        let t = elapsed_ms as f64;
        if t >= self.duration_ms {
            return 0.0;
        }

        let a = self.amplitude;
        let decayed = (t * t / (self.tau * self.duration_ms * (1.0 - a)) - t / self.tau - 1.0)
            * (-t / self.tau).exp()
            + 1.0;
        let fraction = 1.0 - self.scale * (1.0 - a) * decayed;

        fraction.clamp(0.0, 1.0)
    }

    /// Instantaneous activity (per-millisecond rate of insulin effect) of a
    /// unit dose `elapsed_ms` after delivery. Zero outside `(0, duration)`.
    pub fn activity(&self, elapsed_ms: i64) -> f64 {
        if elapsed_ms <= 0 {
            return 0.0;
        }
        let t = elapsed_ms as f64;
        if t >= self.duration_ms {
            return 0.0;
        }

        let value =
            (self.scale / (self.tau * self.tau)) * t * (1.0 - t / self.duration_ms)
                * (-t / self.tau).exp();

        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HOUR_MS: i64 = 3_600_000;
    const MIN_MS: i64 = 60_000;

    fn reference_profile() -> InsulinProfile {
        // peak 30 min, DIA 5 h: the reference rapid-acting curve
        InsulinProfile::standard("rapid", 5 * HOUR_MS, 30 * MIN_MS).unwrap()
    }

    #[test]
    fn test_boundary_values() {
        let curve = ActivityCurve::new(&reference_profile());

        assert_relative_eq!(curve.iob_fraction(0), 1.0);
        assert_relative_eq!(curve.iob_fraction(-HOUR_MS), 1.0);
        assert_relative_eq!(curve.iob_fraction(5 * HOUR_MS), 0.0);
        assert_relative_eq!(curve.iob_fraction(6 * HOUR_MS), 0.0);

        assert_relative_eq!(curve.activity(0), 0.0);
        assert_relative_eq!(curve.activity(-HOUR_MS), 0.0);
        assert_relative_eq!(curve.activity(5 * HOUR_MS), 0.0);
    }

    #[test]
    fn test_reference_curve_shape() {
        // Regression fixture for the reference rapid-acting curve.
        let curve = ActivityCurve::new(&reference_profile());

        assert_relative_eq!(curve.iob_fraction(HOUR_MS), 0.392, epsilon = 0.005);
        assert_relative_eq!(curve.iob_fraction(2 * HOUR_MS), 0.078, epsilon = 0.005);
        assert_relative_eq!(curve.iob_fraction(3 * HOUR_MS), 0.011, epsilon = 0.005);
        assert!(curve.iob_fraction(4 * HOUR_MS) < 0.005);
    }

    #[test]
    fn test_fraction_monotonically_non_increasing() {
        let profiles = [
            InsulinProfile::standard("rapid", 5 * HOUR_MS, 30 * MIN_MS).unwrap(),
            InsulinProfile::standard("ultra", 3 * HOUR_MS, 45 * MIN_MS).unwrap(),
            InsulinProfile::standard("slow", 8 * HOUR_MS, 2 * HOUR_MS).unwrap(),
        ];

        for profile in &profiles {
            let curve = ActivityCurve::new(profile);
            let mut previous = 1.0;
            let mut t = 0;
            while t <= profile.duration_of_action_ms() + MIN_MS {
                let fraction = curve.iob_fraction(t);
                assert!(
                    fraction <= previous + 1e-12,
                    "fraction increased at t={} for {}",
                    t,
                    profile.label()
                );
                assert!((0.0..=1.0).contains(&fraction));
                previous = fraction;
                t += MIN_MS;
            }
        }
    }

    #[test]
    fn test_activity_peaks_near_peak_time() {
        let profile = reference_profile();
        let curve = ActivityCurve::new(&profile);

        let mut best_t = 0;
        let mut best = 0.0;
        let mut t = MIN_MS;
        while t < profile.duration_of_action_ms() {
            let activity = curve.activity(t);
            assert!(activity >= 0.0);
            if activity > best {
                best = activity;
                best_t = t;
            }
            t += MIN_MS;
        }

        // Sampled maximum should land within a couple of minutes of tp.
        assert!((best_t - profile.peak_time_ms()).abs() <= 2 * MIN_MS);
    }
}
