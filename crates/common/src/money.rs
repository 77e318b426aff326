//! Fixed-point currency.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money amount represented in cents to avoid floating point issues.
///
/// Sums and products of whole cents are exact, so totals never need rounding.
/// The only place a fractional cent can appear is when parsing a decimal
/// string or dividing, and both use round-half-even. Arithmetic is checked:
/// an overflowing total is `None`, never a wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

/// Errors produced when parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0:?}")]
    Invalid(String),

    #[error("amount out of range: {0:?}")]
    Overflow(String),
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Divides by `divisor`, rounding half to even. Division by zero yields zero.
    pub fn div_round_half_even(&self, divisor: u64) -> Money {
        if divisor == 0 {
            return Money::zero();
        }
        let divisor = i128::from(divisor);
        let value = i128::from(self.cents);
        let quotient = value / divisor;
        let remainder = (value % divisor).abs();
        let twice = remainder * 2;
        let bump = if twice > divisor || (twice == divisor && quotient % 2 != 0) {
            value.signum()
        } else {
            0
        };
        // |quotient + bump| <= |value|, which came from an i64.
        Money {
            cents: (quotient + bump) as i64,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    /// Parses `"12"`, `"12.5"`, `"-0.125"` and similar. Digits beyond the
    /// second decimal place are rounded half to even.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MoneyParseError::Empty);
        }
        let invalid = || MoneyParseError::Invalid(s.to_string());
        let overflow = || MoneyParseError::Overflow(s.to_string());

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };

        let digits: Vec<i64> = fraction.bytes().map(|b| i64::from(b - b'0')).collect();
        let tenths = digits.first().copied().unwrap_or(0);
        let hundredths = digits.get(1).copied().unwrap_or(0);
        let mut cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths))
            .ok_or_else(overflow)?;

        let rest = digits.get(2..).unwrap_or(&[]);
        if let Some((&first, tail)) = rest.split_first() {
            let round_up = match first {
                6..=9 => true,
                5 => tail.iter().any(|&d| d != 0) || cents % 2 != 0,
                _ => false,
            };
            if round_up {
                cents = cents.checked_add(1).ok_or_else(overflow)?;
            }
        }

        Ok(Money {
            cents: if negative { -cents } else { cents },
        })
    }
}
