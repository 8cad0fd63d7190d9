//! Integer amounts at the ledger's base-unit scale.

use crate::domain::decimal::{Decimal, DecimalRangeError};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default scale exponent: S = 10^18.
pub const DEFAULT_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,
    #[error("amount {0:?} is not a non-negative decimal number")]
    Malformed(String),
    #[error("amount has {found} fractional digits, asset supports {max}")]
    TooPrecise { found: usize, max: u32 },
}

/// Non-negative amount in base units. Never converted to floating point.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BaseUnits(BigUint);

impl BaseUnits {
    pub fn new(value: BigUint) -> Self {
        BaseUnits(value)
    }

    pub fn zero() -> Self {
        BaseUnits(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// `10^decimals`, the base-unit value of one whole token.
    pub fn one(decimals: u32) -> Self {
        BaseUnits(scale_factor(decimals))
    }

    /// Parse a human amount such as `"12.5"` into base units, exactly.
    pub fn parse_display(input: &str, decimals: u32) -> Result<Self, AmountParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(AmountParseError::Malformed(input.to_string()));
        }
        if frac.len() > decimals as usize {
            return Err(AmountParseError::TooPrecise {
                found: frac.len(),
                max: decimals,
            });
        }

        let mut digits = String::with_capacity(whole.len() + decimals as usize);
        digits.push_str(whole);
        digits.push_str(frac);
        digits.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));

        BigUint::from_str(&digits)
            .map(BaseUnits)
            .map_err(|_| AmountParseError::Malformed(input.to_string()))
    }

    /// Scale down by `10^decimals` for display. This is the only division by S.
    pub fn to_display(&self, decimals: u32) -> Result<Decimal, DecimalRangeError> {
        Decimal::from_ratio(&self.0, &scale_factor(decimals), decimals)
    }

    /// `self × pct / 100`, truncated.
    pub fn percentage(&self, pct: u32) -> BaseUnits {
        BaseUnits(&self.0 * BigUint::from(pct) / BigUint::from(100u32))
    }
}

pub fn scale_factor(decimals: u32) -> BigUint {
    BigUint::from(10u32).pow(decimals)
}

impl From<u64> for BaseUnits {
    fn from(value: u64) -> Self {
        BaseUnits(BigUint::from(value))
    }
}

impl From<u128> for BaseUnits {
    fn from(value: u128) -> Self {
        BaseUnits(BigUint::from(value))
    }
}

impl From<BigUint> for BaseUnits {
    fn from(value: BigUint) -> Self {
        BaseUnits(value)
    }
}

impl FromStr for BaseUnits {
    type Err = AmountParseError;

    /// Parse a raw base-unit integer string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigUint::from_str(s.trim())
            .map(BaseUnits)
            .map_err(|_| AmountParseError::Malformed(s.to_string()))
    }
}

impl fmt::Display for BaseUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Base-unit integers routinely exceed 2^53, so they travel as strings.
impl Serialize for BaseUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for BaseUnits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BaseUnits::from_str(&s).map_err(serde::de::Error::custom)
    }
}
