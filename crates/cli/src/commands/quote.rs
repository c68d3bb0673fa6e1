//! Offline order quotes.
//!
//! Builds a cart from command-line items and prices it with the same
//! calculator and coupon book the storefront uses.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use neoshop_core::{
    Cart, CartError, CartLine, Coupon, CouponBook, CouponError, Money, OrderTotals, PricingPolicy,
    ProductId, ShippingMethod, Variant,
};

/// Errors that can occur while building a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// An `--item` argument is malformed.
    #[error("Invalid item \"{0}\": expected <product-id>:<unit-price>:<quantity>")]
    InvalidItem(String),

    /// A price could not be read.
    #[error("Invalid price in item \"{item}\": {reason}")]
    InvalidPrice { item: String, reason: String },

    /// A quantity could not be read or is zero.
    #[error("Invalid quantity in item \"{0}\": must be a whole number of at least 1")]
    InvalidQuantity(String),

    /// The tax rate override is out of range.
    #[error("Tax rate must be between 0 and 1")]
    InvalidTaxRate,

    /// The cart rejected a line.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The coupon code was not accepted.
    #[error(transparent)]
    Coupon(#[from] CouponError),
}

/// One `--item` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
}

impl std::str::FromStr for ItemSpec {
    type Err = QuoteError;

    /// Parse `<product-id>:<unit-price>:<quantity>`. The product id may itself
    /// contain colons; the last two fields are taken from the right.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let (Some(quantity), Some(price), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(QuoteError::InvalidItem(s.to_owned()));
        };

        let id = id.trim();
        if id.is_empty() {
            return Err(QuoteError::InvalidItem(s.to_owned()));
        }

        let unit_price = price
            .parse::<Money>()
            .map_err(|e| QuoteError::InvalidPrice {
                item: s.to_owned(),
                reason: e.to_string(),
            })?;

        let quantity = quantity
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&q| q > 0)
            .ok_or_else(|| QuoteError::InvalidQuantity(s.to_owned()))?;

        Ok(Self {
            product_id: ProductId::new(id),
            unit_price,
            quantity,
        })
    }
}

/// Inputs to [`quote`].
#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub items: Vec<ItemSpec>,
    pub shipping: ShippingMethod,
    pub coupon: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub free_shipping_threshold: Option<Money>,
}

/// One priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// A priced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub shipping_method: ShippingMethod,
    pub coupon: Option<Coupon>,
    pub totals: OrderTotals,
}

/// Price the items in `args`.
///
/// Repeated product ids are merged into one line like the storefront cart
/// does; the last price given wins.
///
/// # Errors
///
/// Returns `QuoteError` for an out-of-range tax rate, an unknown coupon or a
/// quantity overflow.
pub fn quote(args: &QuoteArgs) -> Result<Quote, QuoteError> {
    let mut policy = PricingPolicy::default();
    if let Some(rate) = args.tax_rate {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(QuoteError::InvalidTaxRate);
        }
        policy.tax_rate = rate;
    }
    if let Some(threshold) = args.free_shipping_threshold {
        policy.free_shipping_threshold = threshold;
    }

    let mut cart = Cart::new();
    for item in &args.items {
        cart.add(CartLine {
            product_id: item.product_id.clone(),
            name: item.product_id.as_str().to_owned(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            variant: Variant::default(),
        })?;
    }

    if let Some(code) = &args.coupon {
        cart.apply_coupon(code, &CouponBook::default())?;
    }

    tracing::debug!(lines = cart.lines().len(), shipping = %args.shipping, "Pricing quote");

    Ok(Quote {
        lines: cart
            .lines()
            .iter()
            .map(|line| QuoteLine {
                product_id: line.product_id.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                line_total: line.line_total(),
            })
            .collect(),
        shipping_method: args.shipping,
        coupon: cart.coupon().cloned(),
        totals: cart.totals(&policy, args.shipping),
    })
}

/// Plain-text rendering of a quote.
#[must_use]
pub fn render_text(quote: &Quote) -> String {
    let mut out = String::new();
    for line in &quote.lines {
        let _ = writeln!(
            out,
            "{:<24} {:>4} x {:>10} = {:>10}",
            line.product_id.as_str(),
            line.quantity,
            line.unit_price.to_string(),
            line.line_total.to_string(),
        );
    }

    let totals = &quote.totals;
    let _ = writeln!(out, "{:<41} {:>10}", "Subtotal", totals.subtotal.to_string());
    let _ = writeln!(
        out,
        "{:<41} {:>10}",
        format!("Shipping ({})", quote.shipping_method.label()),
        totals.shipping.to_string(),
    );
    let _ = writeln!(out, "{:<41} {:>10}", "Tax", totals.tax.to_string());
    if let Some(coupon) = &quote.coupon {
        let _ = writeln!(
            out,
            "{:<41} {:>10}",
            format!("Discount ({})", coupon.code),
            format!("-{}", totals.discount),
        );
    }
    let _ = write!(out, "{:<41} {:>10}", "Total", totals.total.to_string());
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> QuoteArgs {
        QuoteArgs {
            items: items.iter().map(|s| s.parse().unwrap()).collect(),
            shipping: ShippingMethod::Standard,
            coupon: None,
            tax_rate: None,
            free_shipping_threshold: None,
        }
    }

    #[test]
    fn test_item_spec_parsing() {
        let item: ItemSpec = "hoodie:40.00:2".parse().unwrap();
        assert_eq!(item.product_id.as_str(), "hoodie");
        assert_eq!(item.unit_price, Money::from_cents(4000));
        assert_eq!(item.quantity, 2);

        let item: ItemSpec = "sku:a:b:$5:1".parse().unwrap();
        assert_eq!(item.product_id.as_str(), "sku:a:b");
        assert_eq!(item.unit_price, Money::from_cents(500));

        assert!(matches!(
            "hoodie:40".parse::<ItemSpec>(),
            Err(QuoteError::InvalidItem(_))
        ));
        assert!(matches!(
            "hoodie:-1:1".parse::<ItemSpec>(),
            Err(QuoteError::InvalidPrice { .. })
        ));
        assert!(matches!(
            "hoodie:10:0".parse::<ItemSpec>(),
            Err(QuoteError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_quote_standard_shipping() {
        let quote = quote(&args(&["hoodie:40.00:2"])).unwrap();
        assert_eq!(quote.totals.subtotal, Money::from_cents(8000));
        assert_eq!(quote.totals.shipping, Money::from_cents(599));
        assert_eq!(quote.totals.tax, Money::from_cents(640));
        assert_eq!(quote.totals.total, Money::from_cents(9239));
    }

    #[test]
    fn test_quote_merges_repeated_items() {
        let quote = quote(&args(&["cap:15:1", "cap:15:2"])).unwrap();
        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.lines.first().unwrap().quantity, 3);
    }

    #[test]
    fn test_quote_with_coupon_and_express() {
        let mut args = args(&["jacket:150:1"]);
        args.shipping = ShippingMethod::Express;
        args.coupon = Some("NEOSHOP20".to_string());

        let quote = quote(&args).unwrap();
        assert_eq!(quote.totals.discount, Money::from_cents(3000));
        assert_eq!(quote.totals.total, Money::from_cents(14499));

        let text = render_text(&quote);
        assert!(text.contains("Discount (NEOSHOP20)"));
        assert!(text.ends_with("$144.99"));
    }

    #[test]
    fn test_quote_rejects_unknown_coupon() {
        let mut args = args(&["cap:15:1"]);
        args.coupon = Some("BOGUS".to_string());
        assert!(matches!(quote(&args), Err(QuoteError::Coupon(_))));
    }

    #[test]
    fn test_quote_overrides() {
        let mut args = args(&["cap:50:1"]);
        args.tax_rate = Some(Decimal::ZERO);
        args.free_shipping_threshold = Some(Money::from_cents(5000));

        let quote = quote(&args).unwrap();
        assert_eq!(quote.totals.total, Money::from_cents(5000));

        let mut bad = self::args(&["cap:50:1"]);
        bad.tax_rate = Some(Decimal::TWO);
        assert!(matches!(super::quote(&bad), Err(QuoteError::InvalidTaxRate)));
    }
}
