//! Scale stabilization: deciding whether a burst of raw samples is one settled weight.
//!
//! The rule is deliberately simple and order-sensitive:
//!
//! 1. Parse every line with the scale parser and drop the unparsable ones.
//! 2. Keep readings inside `(min_exclusive, max_inclusive]`; all `sample_count` lines must
//!    survive, otherwise the burst is [`AcquisitionError::OutOfRange`].
//! 3. The **first** surviving reading is the reference. Count readings within
//!    `±tolerance` of it (inclusive, the reference counts itself). At least `min_agreeing`
//!    accepts the reference rounded to two decimals; fewer is [`AcquisitionError::Unstable`].
//!
//! Agreement is measured against the first sample, not a median: a burst whose first sample
//! is the outlier is unstable even when the remaining ones agree with each other.

use super::reading::{ParsedReading, ResponseFormat, DEFAULT_SCALE_UNIT};
use crate::error::AcquisitionError;
use serde::Serialize;

/// Thresholds applied to one burst of scale samples.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityCriteria {
    /// Lines collected per acquisition, all of which must be in range.
    pub sample_count: usize,
    /// Readings (including the reference) that must agree with the reference.
    pub min_agreeing: usize,
    /// Relative agreement band around the reference (0.01 = ±1%).
    pub tolerance: f64,
    /// Lower bound of the plausible range, exclusive.
    pub min_exclusive: f64,
    /// Upper bound of the plausible range, inclusive.
    pub max_inclusive: f64,
}

impl Default for StabilityCriteria {
    fn default() -> Self {
        Self {
            sample_count: 4,
            min_agreeing: 3,
            tolerance: 0.01,
            min_exclusive: 0.0,
            max_inclusive: 500.0,
        }
    }
}

impl StabilityCriteria {
    /// Whether `value` lies in the plausible instrument range.
    pub fn in_range(&self, value: f64) -> bool {
        value > self.min_exclusive && value <= self.max_inclusive
    }
}

/// A settled weight and the in-range readings it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilizedWeight {
    /// Reference reading rounded to two decimals.
    pub value: f64,
    /// Unit of the reference reading.
    pub unit: String,
    /// In-range readings of the burst, in arrival order.
    pub samples: Vec<ParsedReading>,
}

/// Round to two decimal places from the exact decimal value of `value`.
///
/// `100.005` is stored as `100.00499…` and rounds down to `100.0`. Values exactly halfway
/// between two hundredths (multiples of 1/8 such as `0.125`) round away from zero.
pub fn round_to_hundredths(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let magnitude = value.abs();
    // `magnitude * 8.0` is exact; only eighths can sit exactly on a half hundredth.
    let scaled = magnitude * 100.0;
    let rounded = if (magnitude * 8.0).fract() == 0.0 && scaled.fract() == 0.5 {
        (scaled.floor() + 1.0) / 100.0
    } else {
        format!("{:.2}", magnitude).parse().unwrap_or(magnitude)
    };
    rounded.copysign(value)
}

/// Apply the stabilization rule to one burst of raw lines.
pub fn stabilize<S: AsRef<str>>(
    lines: &[S],
    criteria: &StabilityCriteria,
) -> Result<StabilizedWeight, AcquisitionError> {
    let in_range: Vec<ParsedReading> = lines
        .iter()
        .filter_map(|line| ResponseFormat::Scale.parse(line.as_ref()).ok())
        .filter(|reading| criteria.in_range(reading.value()))
        .collect();

    let out_of_range = || AcquisitionError::OutOfRange {
        in_range: in_range.len(),
        required: criteria.sample_count,
        min: criteria.min_exclusive,
        max: criteria.max_inclusive,
    };
    if in_range.len() < criteria.sample_count {
        return Err(out_of_range());
    }
    let reference = in_range.first().ok_or_else(out_of_range)?;

    let band = (reference.value() * criteria.tolerance).abs();
    let agreeing = in_range
        .iter()
        .filter(|reading| (reading.value() - reference.value()).abs() <= band)
        .count();

    if agreeing < criteria.min_agreeing {
        return Err(AcquisitionError::Unstable {
            reference: reference.value(),
            agreeing,
            required: criteria.min_agreeing,
            tolerance_pct: criteria.tolerance * 100.0,
        });
    }

    let value = round_to_hundredths(reference.value());
    let unit = reference.unit().unwrap_or(DEFAULT_SCALE_UNIT).to_string();
    Ok(StabilizedWeight {
        value,
        unit,
        samples: in_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> Result<StabilizedWeight, AcquisitionError> {
        stabilize(lines, &StabilityCriteria::default())
    }

    #[test]
    fn test_all_samples_agree() {
        let weight = run(&["100.01g", "100.00g", "99.99g", "100.02g"]).unwrap();
        assert_eq!(weight.value, 100.01);
        assert_eq!(weight.unit, "g");
        assert_eq!(weight.samples.len(), 4);
    }

    #[test]
    fn test_result_is_rounded_first_sample() {
        let weight = run(&["12.3456 g", "12.35 g", "12.34 g", "12.36 g"]).unwrap();
        assert_eq!(weight.value, 12.35);
    }

    #[test]
    fn test_three_of_four_is_enough() {
        // 50 is outside ±1% of the reference; the other three agree with it.
        let weight = run(&["100g", "50g", "100g", "100g"]).unwrap();
        assert_eq!(weight.value, 100.0);
    }

    #[test]
    fn test_first_sample_outlier_is_unstable() {
        let err = run(&["50g", "100g", "100g", "100g"]).unwrap_err();
        assert_eq!(
            err,
            AcquisitionError::Unstable {
                reference: 50.0,
                agreeing: 1,
                required: 3,
                tolerance_pct: 1.0,
            }
        );
    }

    #[test]
    fn test_two_of_four_is_unstable() {
        let err = run(&["100g", "100.5g", "110g", "90g"]).unwrap_err();
        assert!(matches!(err, AcquisitionError::Unstable { agreeing: 2, .. }));
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let weight = run(&["100g", "101g", "99g", "150g"]).unwrap();
        assert_eq!(weight.value, 100.0);
    }

    #[test]
    fn test_out_of_range_sample_fails_burst() {
        let err = run(&["100g", "100g", "100g", "600g"]).unwrap_err();
        assert_eq!(
            err,
            AcquisitionError::OutOfRange {
                in_range: 3,
                required: 4,
                min: 0.0,
                max: 500.0,
            }
        );
    }

    #[test]
    fn test_zero_and_negative_are_out_of_range() {
        assert!(matches!(
            run(&["0g", "0g", "0g", "0g"]),
            Err(AcquisitionError::OutOfRange { in_range: 0, .. })
        ));
        assert!(matches!(
            run(&["-5g", "100g", "100g", "100g"]),
            Err(AcquisitionError::OutOfRange { in_range: 3, .. })
        ));
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        let weight = run(&["500g", "500g", "499.9g", "500g"]).unwrap();
        assert_eq!(weight.value, 500.0);
    }

    #[test]
    fn test_unparsable_line_counts_against_range() {
        let err = run(&["100g", "", "100g", "100g"]).unwrap_err();
        assert!(matches!(err, AcquisitionError::OutOfRange { in_range: 3, .. }));
    }

    #[test]
    fn test_unit_comes_from_first_sample() {
        let weight = run(&["10.00 kg", "10.00 g", "10.01", "10.00 g"]).unwrap();
        assert_eq!(weight.unit, "kg");
    }

    #[test]
    fn test_round_to_hundredths() {
        assert_eq!(round_to_hundredths(1.234), 1.23);
        assert_eq!(round_to_hundredths(99.999), 100.0);
        assert_eq!(round_to_hundredths(42.0), 42.0);
    }

    #[test]
    fn test_rounding_follows_stored_decimal_value() {
        // Stored just below the half hundredth.
        assert_eq!(round_to_hundredths(100.005), 100.0);
        assert_eq!(round_to_hundredths(100.035), 100.03);
        assert_eq!(round_to_hundredths(1.005), 1.0);
        assert_eq!(round_to_hundredths(2.675), 2.67);
    }

    #[test]
    fn test_exact_halves_round_away_from_zero() {
        assert_eq!(round_to_hundredths(0.125), 0.13);
        assert_eq!(round_to_hundredths(0.375), 0.38);
        assert_eq!(round_to_hundredths(100.625), 100.63);
        assert_eq!(round_to_hundredths(-0.125), -0.13);
    }

    #[test]
    fn test_half_hundredth_bursts() {
        let weight = run(&["100.005g", "100.005g", "100.005g", "100.005g"]).unwrap();
        assert_eq!(weight.value, 100.0);

        let weight = run(&["100.035g", "100.035g", "100.035g", "100.035g"]).unwrap();
        assert_eq!(weight.value, 100.03);
    }

    #[test]
    fn test_negative_reference_agrees_with_itself() {
        let criteria = StabilityCriteria {
            min_exclusive: -50.0,
            ..StabilityCriteria::default()
        };
        let weight = stabilize(&["-10g", "-10g", "-10.05g", "-20g"], &criteria).unwrap();
        assert_eq!(weight.value, -10.0);
    }
}
