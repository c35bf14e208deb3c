//! Structured dual-unit presentation of dose amounts.
//!
//! When a non-standard concentration is in use, the pump displays and
//! delivers concentrated units while the engine reasons in normalized
//! units. Showing only one of the two invites mis-dosing, so the decision
//! of when both must appear lives here, next to the math, rather than in
//! the presentation layer. Rendering and localization stay with the caller.

use serde::Serialize;

use crate::concentration;
use crate::error::EngineResult;
use crate::profile::InsulinProfile;

/// Presentation decision for one amount. `concentrated_units` is `Some`
/// exactly when the profile's concentration differs from the reference,
/// in which case the caller must render both values side by side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseDisplay {
    pub normalized_units: f64,
    pub concentrated_units: Option<f64>,
    pub concentration_factor: f64,
}

impl DoseDisplay {
    pub fn requires_dual_units(&self) -> bool {
        self.concentrated_units.is_some()
    }
}

/// Decides how a normalized amount must be presented for the given insulin.
pub fn format_for_display(
    normalized_units: f64,
    profile: &InsulinProfile,
) -> EngineResult<DoseDisplay> {
    let factor = profile.concentration_factor();
    if profile.is_standard_concentration() {
        return Ok(DoseDisplay {
            normalized_units,
            concentrated_units: None,
            concentration_factor: factor,
        });
    }
    let converted = concentration::from_normalized(normalized_units, factor)?;
    Ok(DoseDisplay {
        normalized_units,
        concentrated_units: Some(converted.concentrated),
        concentration_factor: factor,
    })
}
