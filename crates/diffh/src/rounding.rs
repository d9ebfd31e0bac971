//! Two rounding rules, kept as separate named functions.
//!
//! - Coordinates, heights and height differences: round half to even.
//! - Pair distances: round half away from zero.
//!
//! Both return `0.0` instead of `-0.0` so that a zero difference never prints
//! with a sign.

use serde::{Deserialize, Serialize};

/// Largest supported decimal count; beyond this `10^d` scaling loses integers.
pub const MAX_DECIMALS: u32 = 9;

/// Round half to even (banker's rounding) at `decimals` places.
#[inline]
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = scale(decimals);
    positive_zero((value * scale).round_ties_even() / scale)
}

/// Round half away from zero at `decimals` places.
#[inline]
pub fn round_half_away(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = scale(decimals);
    positive_zero((value * scale).round() / scale)
}

#[inline]
fn scale(decimals: u32) -> f64 {
    10f64.powi(decimals.min(MAX_DECIMALS) as i32)
}

#[inline]
fn positive_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Rounding precisions per field family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingCfg {
    /// Coordinates, heights and height differences (half to even).
    pub coord_decimals: u32,
    /// Pair distances (half away from zero).
    pub distance_decimals: u32,
}

impl Default for RoundingCfg {
    fn default() -> Self {
        Self {
            coord_decimals: 2,
            distance_decimals: 3,
        }
    }
}

impl RoundingCfg {
    #[inline]
    pub fn coord(&self, v: f64) -> f64 {
        round_half_even(v, self.coord_decimals)
    }
    #[inline]
    pub fn distance(&self, v: f64) -> f64 {
        round_half_away(v, self.distance_decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rules_differ_on_exact_half() {
        // 0.125 and 2.5 are exact in binary, so the tie is real.
        assert_eq!(round_half_even(0.125, 2), 0.12);
        assert_eq!(round_half_away(0.125, 2), 0.13);
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_away(2.5, 0), 3.0);
        assert_eq!(round_half_even(-0.375, 2), -0.38);
        assert_eq!(round_half_away(-0.375, 2), -0.38);
    }

    #[test]
    fn negative_zero_is_normalized() {
        let r = round_half_even(-0.001, 2);
        assert_eq!(r, 0.0);
        assert!(r.is_sign_positive());
        assert!(round_half_away(-0.0004, 3).is_sign_positive());
    }

    #[test]
    fn survey_values_keep_their_precision() {
        assert_eq!(round_half_even(7_466_893.084, 2), 7_466_893.08);
        assert_eq!(round_half_even(137.9 - 138.0, 2), -0.1);
        assert_eq!(round_half_away(3.992_493_7, 3), 3.992);
    }

    #[test]
    fn non_finite_passes_through() {
        assert!(round_half_even(f64::NAN, 2).is_nan());
        assert_eq!(round_half_away(f64::INFINITY, 3), f64::INFINITY);
    }

    proptest! {
        #[test]
        fn half_even_is_idempotent(v in -1.0e7f64..1.0e7, d in 0u32..6) {
            let once = round_half_even(v, d);
            prop_assert_eq!(round_half_even(once, d), once);
        }

        #[test]
        fn half_away_is_idempotent(v in -1.0e7f64..1.0e7, d in 0u32..6) {
            let once = round_half_away(v, d);
            prop_assert_eq!(round_half_away(once, d), once);
        }
    }
}
