//! Non-negative monetary amounts using decimal arithmetic.
//!
//! Every amount the storefront deals with (unit prices, shipping, tax,
//! discounts, totals) is a [`Money`]. The type cannot hold a negative value,
//! so subtraction is only offered in its saturating form.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount was below zero.
    #[error("amount cannot be negative (got {0})")]
    Negative(Decimal),
}

/// A non-negative amount in the store currency.
///
/// ## Examples
///
/// ```
/// use neoshop_core::Money;
///
/// let price = Money::from_cents(1999);
/// assert_eq!(price.to_string(), "$19.99");
/// assert_eq!((price * 3).to_string(), "$59.97");
/// assert!(Money::from_cents(500).saturating_sub(price).is_zero());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create an amount from a whole number of cents.
    #[must_use]
    pub const fn from_cents(cents: u32) -> Self {
        Self(Decimal::from_parts(cents, 0, 0, false, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, clamping the result at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Add, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Multiply by a non-negative rate, rounded to cents.
    ///
    /// Negative rates yield zero.
    #[must_use]
    pub fn scale(self, rate: Decimal) -> Self {
        if rate.is_sign_negative() {
            return Self::ZERO;
        }
        Self(self.0 * rate).round_cents()
    }

    /// Take `percent` percent of the amount, rounded to cents.
    #[must_use]
    pub fn percent(self, percent: Decimal) -> Self {
        self.scale(percent / Decimal::ONE_HUNDRED)
    }

    /// Round to two decimal places, half away from zero.
    #[must_use]
    pub fn round_cents(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self::Output {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .trim_start_matches('$')
            .parse::<Decimal>()
            .map_err(|_| MoneyParseError::Invalid(s.to_owned()))?;
        Ok(Self::new(amount)?)
    }
}

/// Errors that can occur when parsing [`Money`] from text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    /// Not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// A negative number.
    #[error(transparent)]
    Negative(#[from] MoneyError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(
            Money::new(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(_))
        ));
        assert!(Money::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_from_cents() {
        assert_eq!(Money::from_cents(599).amount(), Decimal::new(599, 2));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!(a.saturating_sub(b), Money::from_cents(750));
        assert_eq!(b.saturating_sub(a), Money::ZERO);
    }

    #[test]
    fn test_percent_rounds_half_away_from_zero() {
        // 20% of 0.125 = 0.025 -> 0.03
        let m = Money::new(Decimal::new(125, 3)).unwrap();
        assert_eq!(m.percent(Decimal::from(20)), Money::from_cents(3));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(640).to_string(), "$6.40");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("$12.99".parse::<Money>().unwrap(), Money::from_cents(1299));
        assert!("-3".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        let max = Money::new(Decimal::MAX).unwrap();
        assert_eq!(max.checked_add(Money::from_cents(1)), None);
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(max.checked_mul(1), Some(max));
        assert_eq!(
            Money::from_cents(1999).checked_mul(3),
            Some(Money::from_cents(5997))
        );
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(250)),
            Some(Money::from_cents(350))
        );
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(350));
    }

    #[test]
    fn test_serde_rejects_negative() {
        assert!(serde_json::from_str::<Money>("\"-1.00\"").is_err());
        let m: Money = serde_json::from_str("\"5.99\"").unwrap();
        assert_eq!(m, Money::from_cents(599));
    }
}
