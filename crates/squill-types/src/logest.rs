//! Logarithmic estimates of row counts and costs.
//!
//! Planner-facing quantities are stored as 10·log2(X) in a signed 16-bit
//! integer. The encoding is deliberately grainy: 16 and 17 both encode to
//! 40, which is fine for estimates. Negative values encode fractions
//! (0.5 → -10).

use std::fmt;

/// A lossy logarithmic encoding of a non-negative quantity.
///
/// For a quantity X the stored value is round(10·log2(X)). Examples:
///
/// ```text
///      1 -> 0              20 -> 43          10000 -> 132
///      2 -> 10             25 -> 46          25000 -> 146
///      3 -> 16            100 -> 66        1000000 -> 199
///      4 -> 20           1000 -> 99        1048576 -> 200
///     10 -> 33           1024 -> 100    4294967296 -> 320
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
pub struct LogEst(pub i16);

impl LogEst {
    /// Encoding of the quantity 1 (log of 1 is 0).
    pub const UNITY: Self = Self(0);

    /// Sentinel for quantities ≤ 0.
    ///
    /// The encoder never takes the logarithm of a non-positive number;
    /// every such input maps here, and [`Self::decode`] maps it back to 0.
    pub const ZERO: Self = Self(i16::MIN);

    /// Encode an arbitrary non-negative quantity.
    ///
    /// Values ≤ 0 return [`Self::ZERO`]. Quantities in the integer range
    /// go through [`Self::from_count`], so the reference vector above
    /// holds exactly; fractions encode as the negation of their
    /// reciprocal (0.5 → -10, 0.0625 → -40); quantities past the u64
    /// range fall back to the floating-point exponent, saturating at the
    /// i16 range.
    #[must_use]
    pub fn encode(x: f64) -> Self {
        if x <= 0.0 {
            return Self::ZERO;
        }
        if x < 1.0 {
            return Self(-Self::encode(1.0 / x).0);
        }
        if x < u64::MAX as f64 {
            return Self::from_count(x.round() as u64);
        }
        let e = (10.0 * x.log2()).round();
        if e >= f64::from(i16::MAX) {
            Self(i16::MAX)
        } else {
            Self(e as i16)
        }
    }

    /// Encode an integer count using the shift-and-table algorithm.
    ///
    /// The count is cut down to a 4-bit mantissa and a shift; a fixed
    /// 8-entry table maps the mantissa to its rounded logarithm. Avoids
    /// floating point entirely. `0` encodes like `1`.
    #[must_use]
    pub fn from_count(x: u64) -> Self {
        const A: [i16; 8] = [0, 2, 3, 5, 6, 7, 8, 9];
        let mut x = x;
        let mut y: i16 = 40;
        if x < 8 {
            if x < 2 {
                return Self(0);
            }
            while x < 8 {
                y -= 10;
                x <<= 1;
            }
        } else {
            let i = 63 - i16::try_from(x.leading_zeros()).unwrap_or(0) - 3;
            y += i * 10;
            x >>= i;
        }
        Self(A[(x & 7) as usize] + y - 10)
    }

    /// Approximate inverse: 2^(e/10).
    ///
    /// Lossy by design; `decode(encode(x))` only lies within the grain of
    /// the mantissa table, which can sit up to about 12% below x and a
    /// few percent above it, never exactly equal.
    #[must_use]
    pub fn decode(self) -> f64 {
        if self == Self::ZERO {
            return 0.0;
        }
        (f64::from(self.0) / 10.0).exp2()
    }

    /// Sum of the underlying quantities' logarithms, i.e. the encoding of
    /// the product of the two estimates. Saturates.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for LogEst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~2^({}/10)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference vector from the original encoding's documentation.
    const VECTOR: [(u64, i16); 15] = [
        (1, 0),
        (2, 10),
        (3, 16),
        (4, 20),
        (10, 33),
        (20, 43),
        (25, 46),
        (100, 66),
        (1000, 99),
        (1024, 100),
        (10000, 132),
        (25000, 146),
        (1_000_000, 199),
        (1_048_576, 200),
        (4_294_967_296, 320),
    ];

    #[test]
    fn test_encode_reference_vector() {
        for (x, e) in VECTOR {
            assert_eq!(LogEst::encode(x as f64), LogEst(e), "encode({x})");
            assert_eq!(LogEst::from_count(x), LogEst(e), "from_count({x})");
        }
    }

    #[test]
    fn test_encode_is_grainy() {
        // 16 and 17 share an encoding; estimates, not exact values.
        assert_eq!(LogEst::encode(16.0), LogEst(40));
        assert_eq!(LogEst::encode(17.0), LogEst(40));
    }

    #[test]
    fn test_nonpositive_maps_to_sentinel() {
        assert_eq!(LogEst::encode(0.0), LogEst::ZERO);
        assert_eq!(LogEst::encode(-4.5), LogEst::ZERO);
        assert_eq!(LogEst::ZERO.decode(), 0.0);
    }

    #[test]
    fn test_fractional_values_go_negative() {
        assert_eq!(LogEst::encode(0.5), LogEst(-10));
        assert_eq!(LogEst::encode(0.0625), LogEst(-40));
    }

    #[test]
    fn test_saturating_add() {
        assert_eq!(LogEst(99).saturating_add(LogEst(1)), LogEst(100));
        assert_eq!(LogEst(i16::MAX).saturating_add(LogEst(10)), LogEst(i16::MAX));
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_grain(x in 1u64..1_000_000_000_000u64) {
            // The 4-bit mantissa truncates, so the stored logarithm can sit
            // up to 10*log2(9/8) ≈ 1.7 units below the true one and the
            // table rounding at most 0.35 above; 2 units covers both sides.
            let back = LogEst::from_count(x).decode();
            let tol = 2.0_f64.powf(0.2) + 1e-9;
            prop_assert!(back / (x as f64) < tol && (x as f64) / back < tol, "x={x} back={back}");
        }

        #[test]
        fn prop_integer_and_float_encoders_agree(x in 1u64..1_000_000_000u64) {
            prop_assert_eq!(LogEst::encode(x as f64), LogEst::from_count(x), "x={}", x);
        }

        #[test]
        fn prop_reciprocal_negates(x in 2u64..1_000_000u64) {
            let e = LogEst::encode(1.0 / x as f64);
            prop_assert_eq!(e.0, -LogEst::from_count(x).0, "x={}", x);
        }

        #[test]
        fn prop_monotone(x in 1u64..1_000_000u64, y in 1u64..1_000_000u64) {
            let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
            prop_assert!(LogEst::from_count(lo) <= LogEst::from_count(hi));
        }
    }
}
