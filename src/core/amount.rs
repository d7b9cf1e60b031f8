//! Monetary amounts in integral base units

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Base units per coin
pub const COIN: i64 = 100_000_000;

/// Maximum number of fractional digits in a coin string
pub const MAX_DECIMALS: usize = 8;

/// Errors raised while parsing a decimal coin string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("Empty amount")]
    Empty,
    #[error("Invalid amount: {0}")]
    Invalid(String),
    #[error("Too many decimal places (max 8): {0}")]
    TooPrecise(String),
    #[error("Amount out of range: {0}")]
    Overflow(String),
}

/// An amount of coins, stored as signed base units.
///
/// Signed so that a negative fee can be represented and rejected by
/// validation rather than by the parser.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create from base units
    pub const fn from_sat(sat: i64) -> Self {
        Self(sat)
    }

    /// Amount in base units
    pub const fn to_sat(self) -> i64 {
        self.0
    }

    /// Convert a floating coin value (as reported by JSON-RPC nodes), rounding
    /// to the nearest base unit
    pub fn from_coins_f64(coins: f64) -> Option<Self> {
        if !coins.is_finite() {
            return None;
        }
        let sat = (coins * COIN as f64).round();
        if sat.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(sat as i64))
    }

    /// Floating coin value for JSON-RPC requests
    pub fn to_coins_f64(self) -> f64 {
        self.0 as f64 / COIN as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let coin = COIN as u64;
        write!(f, "{}{}.{:08}", sign, abs / coin, abs % coin)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    /// Parse a decimal coin string such as `"1.5"`, `"-0.0001"` or `".25"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountParseError::Invalid(s.to_string()));
        }
        if frac.len() > MAX_DECIMALS {
            return Err(AmountParseError::TooPrecise(s.to_string()));
        }

        let overflow = || AmountParseError::Overflow(s.to_string());
        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_units: i64 = if frac.is_empty() {
            0
        } else {
            format!("{:0<width$}", frac, width = MAX_DECIMALS)
                .parse()
                .map_err(|_| overflow())?
        };

        let sat = whole_units
            .checked_mul(COIN)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -sat } else { sat }))
    }
}
