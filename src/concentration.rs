//! Conversions between device-reported "concentrated" units and the
//! engine's normalized unit basis.
//!
//! Every amount or rate crossing the device boundary passes through here
//! before any dosing math sees it. The original concentrated value is kept
//! alongside the normalized one because safety review requires showing both
//! whenever a non-standard concentration is in use.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// A one-shot amount after conversion. `normalized` feeds the engine,
/// `concentrated` is what the device reported and displays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvertedAmount {
    pub normalized: f64,
    pub concentrated: f64,
    pub concentration_factor: f64,
}

/// A rate after conversion. Percentage (relative) rates are dimensionless
/// and pass through unscaled; only absolute units/hour rates are converted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvertedRate {
    pub normalized: f64,
    pub concentrated: f64,
    pub is_absolute: bool,
    pub concentration_factor: f64,
}

fn check_factor(concentration_factor: f64) -> EngineResult<()> {
    if !(concentration_factor > 0.0) || !concentration_factor.is_finite() {
        return Err(EngineError::Configuration(format!(
            "concentration factor must be positive and finite, got {}",
            concentration_factor
        )));
    }
    Ok(())
}

/// Converts a device-reported amount into the normalized basis.
pub fn to_normalized(
    concentrated_amount: f64,
    concentration_factor: f64,
) -> EngineResult<ConvertedAmount> {
    check_factor(concentration_factor)?;
    Ok(ConvertedAmount {
        normalized: concentrated_amount * concentration_factor,
        concentrated: concentrated_amount,
        concentration_factor,
    })
}

/// Converts a normalized amount back into device (concentrated) units.
pub fn from_normalized(
    normalized_amount: f64,
    concentration_factor: f64,
) -> EngineResult<ConvertedAmount> {
    check_factor(concentration_factor)?;
    Ok(ConvertedAmount {
        normalized: normalized_amount,
        concentrated: normalized_amount / concentration_factor,
        concentration_factor,
    })
}

/// Converts a device-reported rate into the normalized basis. Relative
/// (percentage) rates are never scaled by concentration.
pub fn to_normalized_rate(
    concentrated_rate: f64,
    concentration_factor: f64,
    is_absolute: bool,
) -> EngineResult<ConvertedRate> {
    check_factor(concentration_factor)?;
    let normalized = if is_absolute {
        concentrated_rate * concentration_factor
    } else {
        concentrated_rate
    };
    Ok(ConvertedRate {
        normalized,
        concentrated: concentrated_rate,
        is_absolute,
        concentration_factor,
    })
}

/// Converts a normalized rate back into device units.
pub fn from_normalized_rate(
    normalized_rate: f64,
    concentration_factor: f64,
    is_absolute: bool,
) -> EngineResult<ConvertedRate> {
    check_factor(concentration_factor)?;
    let concentrated = if is_absolute {
        normalized_rate / concentration_factor
    } else {
        normalized_rate
    };
    Ok(ConvertedRate {
        normalized: normalized_rate,
        concentrated,
        is_absolute,
        concentration_factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_amount_conversion() {
        // 5 concentrated units of a double-strength insulin are 10
        // normalized units.
        let converted = to_normalized(5.0, 2.0).unwrap();
        assert_relative_eq!(converted.normalized, 10.0);
        assert_relative_eq!(converted.concentrated, 5.0);
    }

    #[test]
    fn test_amount_round_trip() {
        for factor in [0.5, 1.0, 2.0, 2.5, 5.0, 0.123456] {
            for amount in [0.0, 0.05, 1.0, 17.3, 250.0] {
                let there = to_normalized(amount, factor).unwrap();
                let back = from_normalized(there.normalized, factor).unwrap();
                assert_relative_eq!(back.concentrated, amount, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_absolute_rate_is_scaled() {
        let converted = to_normalized_rate(1.2, 2.0, true).unwrap();
        assert_relative_eq!(converted.normalized, 2.4);

        let back = from_normalized_rate(converted.normalized, 2.0, true).unwrap();
        assert_relative_eq!(back.concentrated, 1.2, max_relative = 1e-9);
    }

    #[test]
    fn test_percentage_rate_is_never_scaled() {
        for factor in [0.5, 1.0, 2.0, 5.0] {
            let converted = to_normalized_rate(150.0, factor, false).unwrap();
            assert_relative_eq!(converted.normalized, 150.0);
            assert_relative_eq!(converted.concentrated, 150.0);
        }
    }

    #[test]
    fn test_rejects_nonpositive_factor() {
        assert!(to_normalized(1.0, 0.0).is_err());
        assert!(to_normalized(1.0, -1.0).is_err());
        assert!(to_normalized(1.0, f64::NAN).is_err());
        assert!(from_normalized(1.0, 0.0).is_err());
        assert!(to_normalized_rate(1.0, 0.0, true).is_err());
        assert!(from_normalized_rate(1.0, -2.0, false).is_err());
    }
}
