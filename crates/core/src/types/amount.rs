//! Non-negative money amounts using decimal arithmetic.
//!
//! The store keeps amounts as `NUMERIC(14,2)` and some clients submit them as
//! strings, so parsing accepts both `"150.5"` and `150.5`. Amounts serialize as
//! decimal strings to avoid float rounding on the wire. Anything the column
//! cannot hold exactly (more than two decimal places, or twelve or more
//! integer digits) is rejected up front.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input was not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),

    /// Amounts can never be negative.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),

    /// A fee entry must move money.
    #[error("amount must be greater than zero")]
    NotPositive,

    /// Amounts are kept to the fen.
    #[error("amount has more than {MAX_SCALE} decimal places: {0}")]
    TooPrecise(Decimal),

    /// Beyond what a `NUMERIC(14,2)` column holds.
    #[error("amount is too large: {0}")]
    TooLarge(Decimal),
}

/// Decimal places an amount may carry.
pub const MAX_SCALE: u32 = 2;

/// 10^12, the smallest value that no longer fits the store's column.
const LIMIT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// A non-negative amount of money in yuan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Zero yuan.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rejecting values the store cannot hold exactly.
    ///
    /// Trailing zeros do not count against the scale, so `12.500` is accepted
    /// as `12.50`.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Negative` if `value < 0`,
    /// `AmountError::TooPrecise` for fractions of a fen and
    /// `AmountError::TooLarge` past the column's range.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountError::Negative(value));
        }
        if value.normalize().scale() > MAX_SCALE {
            return Err(AmountError::TooPrecise(value));
        }
        if value >= LIMIT {
            return Err(AmountError::TooLarge(value));
        }
        Ok(Self(value))
    }

    /// Create an amount from a whole number of yuan.
    #[must_use]
    pub fn from_yuan(yuan: u32) -> Self {
        Self(Decimal::from(yuan))
    }

    /// Parse an amount from its textual form.
    ///
    /// # Errors
    ///
    /// Returns `AmountError::Invalid` for non-numeric input, otherwise the
    /// errors of [`Amount::new`].
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let value = Decimal::from_str(s.trim()).map_err(|_| AmountError::Invalid(s.to_owned()))?;
        Self::new(value)
    }

    /// Ensure the amount is strictly positive (required for fee entries).
    ///
    /// # Errors
    ///
    /// Returns `AmountError::NotPositive` for zero.
    pub fn require_positive(self) -> Result<Self, AmountError> {
        if self.0.is_zero() {
            return Err(AmountError::NotPositive);
        }
        Ok(self)
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for Amount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Amount {
    /// Trailing zeros are dropped: `12500.00` displays as `12500`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
