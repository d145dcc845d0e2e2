//! Fixed-point stake amounts.
//!
//! Amounts arrive as integer strings in base units scaled by 10^18. They are
//! kept as exact integers so that grid totals never drift; the decimal view
//! is derived on demand.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base units per whole token.
pub const UNITS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Number of decimal places carried by a base unit.
pub const DECIMALS: usize = 18;

/// A non-negative stake amount in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stake(u128);

impl Stake {
    /// No stake.
    pub const ZERO: Self = Self(0);

    /// Create from raw base units.
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Create from whole tokens.
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * UNITS_PER_TOKEN)
    }

    /// Parse a fixed-point integer string (e.g. `"1000000000000000000"`).
    pub fn parse_base_units(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAmount(raw.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Self)
            .map_err(|_| Error::InvalidAmount(raw.to_string()))
    }

    /// Raw base units.
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Decimal token amount (base units divided by 10^18).
    pub fn as_decimal(&self) -> f64 {
        let whole = (self.0 / UNITS_PER_TOKEN) as f64;
        let frac = (self.0 % UNITS_PER_TOKEN) as f64 / UNITS_PER_TOKEN as f64;
        whole + frac
    }

    /// Whether the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add, `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Subtract, `None` on underflow.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Percentage of `total` this amount represents, 0 when `total` is zero.
    pub fn percent_of(&self, total: Stake) -> f64 {
        if total.is_zero() {
            0.0
        } else {
            self.0 as f64 * 100.0 / total.0 as f64
        }
    }
}

/// Saturating. The store refuses batches whose total would overflow, so
/// sums over its cells never reach the bound.
impl Add for Stake {
    type Output = Stake;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Stake {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Stake {
    fn sum<I: Iterator<Item = Stake>>(iter: I) -> Self {
        iter.fold(Stake::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Stake> for Stake {
    fn sum<I: Iterator<Item = &'a Stake>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Stake {
    /// Exact decimal form with trailing zeros trimmed (`1.5`, `0`, `12`).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / UNITS_PER_TOKEN;
        let frac = self.0 % UNITS_PER_TOKEN;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0width$}", width = DECIMALS);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}
