//! The cart aggregate.
//!
//! A [`Cart`] owns its line items and the applied coupon. Lines are unique by
//! [`LineKey`] (product plus chosen variant) and always have a quantity of at
//! least one. Each successful mutation returns a [`CartChange`] so the caller
//! can mirror it to the commerce backend.
//!
//! The subtotal never exceeds [`MAX_SUBTOTAL`], which leaves room for
//! shipping and tax in the decimal range.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::{Coupon, CouponBook, CouponError, OrderTotals, PricingPolicy, ShippingMethod};
use crate::types::{Money, ProductId, Variant};

/// Largest subtotal a cart accepts: one billion.
pub const MAX_SUBTOTAL: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Errors returned by cart mutations. The cart is unchanged when one occurs.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A quantity below one was requested.
    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(i64),
    /// The quantity does not fit the line counter.
    #[error("quantity is too large")]
    QuantityTooLarge,
    /// The cart subtotal would exceed [`MAX_SUBTOTAL`].
    #[error("cart total is too large")]
    AmountTooLarge,
    /// No line matches the key.
    #[error("item {0} is not in the cart")]
    LineNotFound(LineKey),
}

/// Identity of a cart line: the product and the variant chosen for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub variant: Variant,
}

impl LineKey {
    /// Create a key.
    #[must_use]
    pub const fn new(product_id: ProductId, variant: Variant) -> Self {
        Self {
            product_id,
            variant,
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variant.label() {
            Some(label) => write!(f, "{} ({label})", self.product_id),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// One product/variant/quantity tuple in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(flatten)]
    pub variant: Variant,
}

impl CartLine {
    /// The line's identity.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant.clone())
    }

    /// Whether this line has the given identity.
    #[must_use]
    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant == key.variant
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// What a successful mutation changed, for mirroring to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartChange {
    /// The line was created or its quantity changed; carries the new state.
    Upserted(CartLine),
    /// The line is gone.
    Removed(LineKey),
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
    #[serde(default)]
    coupon: Option<Coupon>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line with the given key, if any.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(key))
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Check that replacing the line at `line`'s key with `line` keeps the
    /// subtotal within [`MAX_SUBTOTAL`].
    fn check_subtotal_with(&self, line: &CartLine) -> Result<(), CartError> {
        let key = line.key();
        let subtotal = self
            .lines
            .iter()
            .filter(|l| !l.matches(&key))
            .chain(std::iter::once(line))
            .try_fold(Money::ZERO, |acc, l| {
                l.unit_price
                    .checked_mul(l.quantity)
                    .and_then(|total| acc.checked_add(total))
            })
            .ok_or(CartError::AmountTooLarge)?;
        if subtotal.amount() > MAX_SUBTOTAL {
            return Err(CartError::AmountTooLarge);
        }
        Ok(())
    }

    /// Add a line, merging with an existing line of the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity,
    /// [`CartError::QuantityTooLarge`] if the merged quantity overflows and
    /// [`CartError::AmountTooLarge`] if the subtotal would pass
    /// [`MAX_SUBTOTAL`].
    pub fn add(&mut self, mut line: CartLine) -> Result<CartChange, CartError> {
        if line.quantity == 0 {
            return Err(CartError::InvalidQuantity(0));
        }

        let key = line.key();
        let index = self.lines.iter().position(|l| l.matches(&key));
        if let Some(existing) = index.and_then(|i| self.lines.get(i)) {
            // Latest price and name win
            line.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(CartError::QuantityTooLarge)?;
        }
        self.check_subtotal_with(&line)?;

        match index.and_then(|i| self.lines.get_mut(i)) {
            Some(existing) => *existing = line.clone(),
            None => self.lines.push(line.clone()),
        }
        Ok(CartChange::Upserted(line))
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Quantities below one are rejected with [`CartError::InvalidQuantity`]
    /// and never stored. Unknown keys yield [`CartError::LineNotFound`], and
    /// a quantity that would push the subtotal past [`MAX_SUBTOTAL`] yields
    /// [`CartError::AmountTooLarge`].
    pub fn update_quantity(
        &mut self,
        key: &LineKey,
        quantity: i64,
    ) -> Result<CartChange, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::QuantityTooLarge)?;

        let mut updated = self
            .line(key)
            .cloned()
            .ok_or_else(|| CartError::LineNotFound(key.clone()))?;
        updated.quantity = quantity;
        self.check_subtotal_with(&updated)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(key)) {
            line.quantity = quantity;
        }
        Ok(CartChange::Upserted(updated))
    }

    /// Change a line's quantity by `delta`, removing it if it would drop
    /// below one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for unknown keys and
    /// [`CartError::QuantityTooLarge`] on overflow.
    pub fn adjust_quantity(&mut self, key: &LineKey, delta: i64) -> Result<CartChange, CartError> {
        let current = self
            .line(key)
            .map(|l| i64::from(l.quantity))
            .ok_or_else(|| CartError::LineNotFound(key.clone()))?;

        let next = current.saturating_add(delta);
        if next < 1 {
            return self.remove(key);
        }
        self.update_quantity(key, next)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if no line matches.
    pub fn remove(&mut self, key: &LineKey) -> Result<CartChange, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.matches(key))
            .ok_or_else(|| CartError::LineNotFound(key.clone()))?;
        self.lines.remove(index);
        Ok(CartChange::Removed(key.clone()))
    }

    /// Drop every line and the coupon.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.coupon = None;
    }

    /// The applied coupon, if any.
    #[must_use]
    pub const fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Try a coupon code.
    ///
    /// On success the coupon replaces any previous one. On failure the
    /// previously applied coupon is cleared so the discount falls back to
    /// zero, and the error is returned for inline display.
    ///
    /// # Errors
    ///
    /// Returns the [`CouponError`] from the book lookup.
    pub fn apply_coupon(&mut self, code: &str, book: &CouponBook) -> Result<&Coupon, CouponError> {
        match book.lookup(code) {
            Ok(coupon) => Ok(&*self.coupon.insert(coupon)),
            Err(e) => {
                self.coupon = None;
                Err(e)
            }
        }
    }

    /// Remove the applied coupon.
    pub fn remove_coupon(&mut self) -> Option<Coupon> {
        self.coupon.take()
    }

    /// Order summary for the current contents.
    #[must_use]
    pub fn totals(&self, policy: &PricingPolicy, method: ShippingMethod) -> OrderTotals {
        policy.totals(self.subtotal(), method, self.coupon.as_ref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, cents: u32, quantity: u32, size: Option<&str>) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Money::from_cents(cents),
            quantity,
            variant: Variant::new(None, size),
        }
    }

    fn key(id: &str, size: Option<&str>) -> LineKey {
        LineKey::new(ProductId::new(id), Variant::new(None, size))
    }

    #[test]
    fn test_add_merges_same_key() {
        let mut cart = Cart::new();
        cart.add(line("tee", 2000, 1, Some("M"))).unwrap();
        let change = cart.add(line("tee", 2000, 2, Some("M"))).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 3);
        assert!(matches!(change, CartChange::Upserted(l) if l.quantity == 3));
    }

    #[test]
    fn test_variants_are_distinct_lines() {
        let mut cart = Cart::new();
        cart.add(line("tee", 2000, 1, Some("M"))).unwrap();
        cart.add(line("tee", 2000, 1, Some("L"))).unwrap();
        cart.add(line("tee", 2000, 1, None)).unwrap();
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add(line("tee", 2000, 0, None)),
            Err(CartError::InvalidQuantity(0))
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn test_subtotal() {
        let mut cart = Cart::new();
        cart.add(line("a", 1250, 2, None)).unwrap();
        cart.add(line("b", 5500, 1, None)).unwrap();
        assert_eq!(cart.subtotal(), Money::from_cents(8000));
    }

    #[test]
    fn test_update_quantity_rejects_non_positive() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 2, None)).unwrap();

        for bad in [0, -1, -50] {
            assert_eq!(
                cart.update_quantity(&key("a", None), bad),
                Err(CartError::InvalidQuantity(bad))
            );
        }
        assert_eq!(cart.line(&key("a", None)).unwrap().quantity, 2);
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let huge = CartLine {
            unit_price: Money::new(Decimal::MAX).unwrap(),
            ..line("yacht", 0, 2, None)
        };
        let mut cart = Cart::new();
        assert_eq!(cart.add(huge), Err(CartError::AmountTooLarge));
        assert!(cart.is_empty());

        let at_limit = CartLine {
            unit_price: Money::new(MAX_SUBTOTAL).unwrap(),
            ..line("yacht", 0, 1, None)
        };
        cart.add(at_limit.clone()).unwrap();
        assert_eq!(cart.add(at_limit), Err(CartError::AmountTooLarge));
        assert_eq!(
            cart.add(line("tee", 1, 1, None)),
            Err(CartError::AmountTooLarge)
        );
        assert_eq!(
            cart.update_quantity(&key("yacht", None), 2),
            Err(CartError::AmountTooLarge)
        );
        assert_eq!(
            cart.adjust_quantity(&key("yacht", None), 1),
            Err(CartError::AmountTooLarge)
        );
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.subtotal().amount(), MAX_SUBTOTAL);
    }

    #[test]
    fn test_update_quantity_sets_value() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 2, None)).unwrap();
        cart.update_quantity(&key("a", None), 5).unwrap();
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_update_quantity_unknown_line() {
        let mut cart = Cart::new();
        assert!(matches!(
            cart.update_quantity(&key("ghost", None), 1),
            Err(CartError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_adjust_below_one_removes() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 1, Some("S"))).unwrap();
        let change = cart.adjust_quantity(&key("a", Some("S")), -1).unwrap();
        assert_eq!(change, CartChange::Removed(key("a", Some("S"))));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_adjust_increments() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 1, None)).unwrap();
        cart.adjust_quantity(&key("a", None), 2).unwrap();
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_remove_matches_variant() {
        let mut cart = Cart::new();
        cart.add(line("a", 1000, 1, Some("S"))).unwrap();
        cart.add(line("a", 1000, 1, Some("M"))).unwrap();
        cart.remove(&key("a", Some("S"))).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert!(cart.line(&key("a", Some("M"))).is_some());
        assert!(cart.remove(&key("a", Some("S"))).is_err());
    }

    #[test]
    fn test_invalid_coupon_clears_previous() {
        let book = CouponBook::default();
        let mut cart = Cart::new();
        cart.add(line("a", 15_000, 1, None)).unwrap();

        cart.apply_coupon("NEOSHOP20", &book).unwrap();
        assert!(cart.coupon().is_some());

        let err = cart.apply_coupon("BOGUS", &book).unwrap_err();
        assert_eq!(err, CouponError::Unknown("BOGUS".to_string()));
        assert!(cart.coupon().is_none());
        assert_eq!(
            cart.totals(&PricingPolicy::default(), ShippingMethod::Express)
                .discount,
            Money::ZERO
        );
    }

    #[test]
    fn test_totals_with_coupon() {
        let mut cart = Cart::new();
        cart.add(line("a", 7500, 2, None)).unwrap();
        cart.apply_coupon("NEOSHOP20", &CouponBook::default()).unwrap();

        let totals = cart.totals(&PricingPolicy::default(), ShippingMethod::Express);
        assert_eq!(totals.total, Money::from_cents(14_499));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add(line("a", 100, 1, None)).unwrap();
        cart.apply_coupon("NEOSHOP20", &CouponBook::default()).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.coupon().is_none());
    }

    #[test]
    fn test_serde_shape() {
        let mut cart = Cart::new();
        cart.add(line("a", 999, 1, Some("M"))).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["lines"][0]["productId"], "a");
        assert_eq!(json["lines"][0]["unitPrice"], "9.99");
        assert_eq!(json["lines"][0]["size"], "M");

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
