//! Lossless decimal display type backed by rust_decimal.
//!
//! Ledger amounts are integers at a fixed base-unit scale; every human-facing value is produced
//! by an exact integer division into a `Decimal`, never by floating point on raw values.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest fractional scale rust_decimal can represent.
pub const MAX_SCALE: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalRangeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("value {0} does not fit a 96-bit decimal")]
    Overflow(String),
}

/// Lossless decimal numeric type for derived display values.
///
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Largest representable value; derived figures saturate here.
    pub const MAX: Decimal = Decimal(RustDecimal::MAX);

    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Exact `num / den`, truncated toward zero at the finest scale (up to `scale`) that fits.
    ///
    /// The quotient is formed entirely in arbitrary precision; only the final digits are
    /// converted, so large base-unit intermediates cannot overflow.
    pub fn from_ratio(num: &BigUint, den: &BigUint, scale: u32) -> Result<Self, DecimalRangeError> {
        if den.is_zero() {
            return Err(DecimalRangeError::DivisionByZero);
        }

        let scale = scale.min(MAX_SCALE);
        let mut scaled = num * BigUint::from(10u32).pow(scale) / den;
        let ten = BigUint::from(10u32);

        for s in (0..=scale).rev() {
            if let Some(mantissa) = scaled.to_i128() {
                if let Ok(value) = RustDecimal::try_from_i128_with_scale(mantissa, s) {
                    return Ok(Decimal(value.normalize()));
                }
            }
            if s > 0 {
                scaled /= &ten;
            }
        }

        Err(DecimalRangeError::Overflow(format!("{}/{}", num, den)))
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Round half away from zero to `dp` fractional digits, padding with zeros.
    pub fn to_fixed(&self, dp: u32) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        format!("{:.*}", dp as usize, rounded)
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}
