//! Order total calculation.
//!
//! Everything here is a pure function of its inputs:
//!
//! ```text
//! total = subtotal + shipping(method, subtotal) + tax(subtotal) - discount(coupon, subtotal)
//! ```
//!
//! The default [`PricingPolicy`] charges 5.99 for standard shipping (free from
//! 100.00), 12.99 for express, 19.99 for next-day, and a flat 8% tax.
//!
//! ```
//! use neoshop_core::{Money, PricingPolicy, ShippingMethod};
//!
//! let totals =
//!     PricingPolicy::default().totals(Money::from_cents(8000), ShippingMethod::Standard, None);
//! assert_eq!(totals.shipping, Money::from_cents(599));
//! assert_eq!(totals.tax, Money::from_cents(640));
//! assert_eq!(totals.total, Money::from_cents(9239));
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Code of the demo coupon shipped in the default [`CouponBook`].
pub const DEMO_COUPON_CODE: &str = "NEOSHOP20";

/// Delivery speed chosen at the shipping step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    NextDay,
}

impl ShippingMethod {
    /// All methods, in display order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Express, Self::NextDay];

    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::NextDay => "nextDay",
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard (5-7 business days)",
            Self::Express => "Express (2-3 business days)",
            Self::NextDay => "Next day",
        }
    }
}

impl std::fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            "nextDay" | "next_day" | "next-day" => Ok(Self::NextDay),
            _ => Err(format!("invalid shipping method: {s}")),
        }
    }
}

/// Rates and thresholds used to price an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPolicy {
    /// Subtotal from which standard shipping is free.
    pub free_shipping_threshold: Money,
    /// Standard shipping below the threshold.
    pub standard_cost: Money,
    /// Express shipping (never waived).
    pub express_cost: Money,
    /// Next-day shipping (never waived).
    pub next_day_cost: Money,
    /// Flat tax rate applied to the subtotal (0.08 = 8%).
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_cents(10_000),
            standard_cost: Money::from_cents(599),
            express_cost: Money::from_cents(1299),
            next_day_cost: Money::from_cents(1999),
            tax_rate: Decimal::new(8, 2),
        }
    }
}

impl PricingPolicy {
    /// Shipping cost for `method` at the given subtotal.
    #[must_use]
    pub fn shipping_cost(&self, method: ShippingMethod, subtotal: Money) -> Money {
        match method {
            ShippingMethod::Standard if subtotal >= self.free_shipping_threshold => Money::ZERO,
            ShippingMethod::Standard => self.standard_cost,
            ShippingMethod::Express => self.express_cost,
            ShippingMethod::NextDay => self.next_day_cost,
        }
    }

    /// Flat tax on the subtotal, rounded to cents.
    #[must_use]
    pub fn tax(&self, subtotal: Money) -> Money {
        subtotal.scale(self.tax_rate)
    }

    /// Coupon discount on the subtotal; zero without a coupon.
    #[must_use]
    pub fn discount(&self, coupon: Option<&Coupon>, subtotal: Money) -> Money {
        coupon.map_or(Money::ZERO, |c| subtotal.percent(c.percent_off))
    }

    /// Derive every figure of the order summary.
    #[must_use]
    pub fn totals(
        &self,
        subtotal: Money,
        method: ShippingMethod,
        coupon: Option<&Coupon>,
    ) -> OrderTotals {
        let shipping = self.shipping_cost(method, subtotal);
        let tax = self.tax(subtotal);
        let discount = self.discount(coupon, subtotal);
        let total = (subtotal + shipping + tax).saturating_sub(discount);

        OrderTotals {
            subtotal,
            shipping,
            tax,
            discount,
            total,
        }
    }
}

/// Shipping cost under the default policy.
#[must_use]
pub fn shipping_cost(method: ShippingMethod, subtotal: Money) -> Money {
    PricingPolicy::default().shipping_cost(method, subtotal)
}

/// Tax under the default policy.
#[must_use]
pub fn tax(subtotal: Money) -> Money {
    PricingPolicy::default().tax(subtotal)
}

/// Discount for a coupon code looked up in the default [`CouponBook`].
///
/// # Errors
///
/// Returns a [`CouponError`] for empty or unknown codes.
pub fn discount(code: &str, subtotal: Money) -> Result<Money, CouponError> {
    let coupon = CouponBook::default().lookup(code)?;
    Ok(PricingPolicy::default().discount(Some(&coupon), subtotal))
}

/// Order total under the default policy.
#[must_use]
pub fn total(subtotal: Money, method: ShippingMethod, coupon: Option<&Coupon>) -> Money {
    PricingPolicy::default()
        .totals(subtotal, method, coupon)
        .total
}

/// The order summary shown at every checkout step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

/// A coupon that has been accepted for the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// The code as the shopper entered it.
    pub code: String,
    /// Percentage taken off the subtotal (20 = 20%).
    pub percent_off: Decimal,
}

/// Why a coupon code was not accepted.
///
/// These are shown inline next to the coupon field; they never abort a
/// request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// Nothing was entered.
    #[error("Enter a coupon code")]
    Empty,
    /// The code does not exist.
    #[error("Coupon code \"{0}\" is not valid")]
    Unknown(String),
}

/// The table of coupon codes the store accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponBook {
    codes: BTreeMap<String, Decimal>,
}

impl Default for CouponBook {
    fn default() -> Self {
        Self::empty().with(DEMO_COUPON_CODE, Decimal::from(20))
    }
}

impl CouponBook {
    /// A book that accepts nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            codes: BTreeMap::new(),
        }
    }

    /// Add (or replace) a code. Percentages are clamped to 0..=100.
    #[must_use]
    pub fn with(mut self, code: &str, percent_off: Decimal) -> Self {
        let percent_off = percent_off.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        self.codes.insert(code.to_owned(), percent_off);
        self
    }

    /// Look up a code. Matching is exact (case-sensitive) after trimming.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Empty`] for blank input and
    /// [`CouponError::Unknown`] for codes not in the book.
    pub fn lookup(&self, code: &str) -> Result<Coupon, CouponError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CouponError::Empty);
        }
        self.codes
            .get(code)
            .map(|&percent_off| Coupon {
                code: code.to_owned(),
                percent_off,
            })
            .ok_or_else(|| CouponError::Unknown(code.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn money(cents: u32) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn test_standard_shipping_threshold() {
        assert_eq!(shipping_cost(ShippingMethod::Standard, money(9999)), money(599));
        assert_eq!(shipping_cost(ShippingMethod::Standard, money(10_000)), Money::ZERO);
        assert_eq!(shipping_cost(ShippingMethod::Standard, money(25_000)), Money::ZERO);
        assert_eq!(shipping_cost(ShippingMethod::Standard, Money::ZERO), money(599));
    }

    #[test]
    fn test_express_and_next_day_never_waived() {
        assert_eq!(shipping_cost(ShippingMethod::Express, money(50_000)), money(1299));
        assert_eq!(shipping_cost(ShippingMethod::NextDay, money(50_000)), money(1999));
    }

    #[test]
    fn test_tax_is_eight_percent() {
        assert_eq!(tax(money(8000)), money(640));
        assert_eq!(tax(money(15_000)), money(1200));
        // 0.08 * 12.34 = 0.9872 -> 0.99
        assert_eq!(tax(money(1234)), money(99));
    }

    #[test]
    fn test_example_standard_under_threshold() {
        let totals = PricingPolicy::default().totals(money(8000), ShippingMethod::Standard, None);
        assert_eq!(totals.shipping, money(599));
        assert_eq!(totals.tax, money(640));
        assert_eq!(totals.discount, Money::ZERO);
        assert_eq!(totals.total, money(9239));
    }

    #[test]
    fn test_example_express_with_coupon() {
        let coupon = CouponBook::default().lookup("NEOSHOP20").unwrap();
        let totals =
            PricingPolicy::default().totals(money(15_000), ShippingMethod::Express, Some(&coupon));
        assert_eq!(totals.shipping, money(1299));
        assert_eq!(totals.tax, money(1200));
        assert_eq!(totals.discount, money(3000));
        assert_eq!(totals.total, money(14_499));
    }

    #[test]
    fn test_total_identity_holds() {
        let book = CouponBook::default();
        let coupon = book.lookup(DEMO_COUPON_CODE).unwrap();
        for cents in [0, 1, 999, 9_999, 10_000, 10_001, 123_456] {
            for method in ShippingMethod::ALL {
                for coupon in [None, Some(&coupon)] {
                    let t = PricingPolicy::default().totals(money(cents), method, coupon);
                    assert_eq!(
                        t.total.amount(),
                        t.subtotal.amount() + t.shipping.amount() + t.tax.amount()
                            - t.discount.amount()
                    );
                }
            }
        }
    }

    #[test]
    fn test_coupon_reduces_total_by_twenty_percent_of_subtotal() {
        let subtotal = money(4_250);
        let without = total(subtotal, ShippingMethod::Standard, None);
        let coupon = CouponBook::default().lookup("NEOSHOP20").unwrap();
        let with = total(subtotal, ShippingMethod::Standard, Some(&coupon));
        assert_eq!(without.saturating_sub(with), money(850));
    }

    #[test]
    fn test_discount_free_function() {
        assert_eq!(discount("NEOSHOP20", money(15_000)), Ok(money(3000)));
        assert_eq!(
            discount("neoshop20", money(15_000)),
            Err(CouponError::Unknown("neoshop20".to_string()))
        );
        assert_eq!(discount("  ", money(15_000)), Err(CouponError::Empty));
    }

    #[test]
    fn test_coupon_lookup_trims() {
        let coupon = CouponBook::default().lookup(" NEOSHOP20 ").unwrap();
        assert_eq!(coupon.code, "NEOSHOP20");
        assert_eq!(coupon.percent_off, Decimal::from(20));
    }

    #[test]
    fn test_coupon_book_clamps_percent() {
        let book = CouponBook::empty().with("ALL", Decimal::from(250));
        let coupon = book.lookup("ALL").unwrap();
        assert_eq!(coupon.percent_off, Decimal::ONE_HUNDRED);
        let t =
            PricingPolicy::default().totals(money(1000), ShippingMethod::Express, Some(&coupon));
        assert_eq!(t.total, money(1299 + 80));
    }

    #[test]
    fn test_shipping_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&ShippingMethod::NextDay).unwrap(),
            "\"nextDay\""
        );
        assert_eq!("express".parse::<ShippingMethod>(), Ok(ShippingMethod::Express));
        assert!("overnight".parse::<ShippingMethod>().is_err());
    }
}
