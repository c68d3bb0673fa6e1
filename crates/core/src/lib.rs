//! NeoShop Core - cart, pricing and checkout domain logic.
//!
//! This crate holds everything about a shopping session that can be decided
//! without talking to the outside world:
//! - `storefront` - the session-holding JSON service built on top of it
//! - `cli` - operator tools (offline order quotes)
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no async. Mutations return values describing what changed so the
//! caller decides how (and whether) to mirror them to the commerce backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, money, emails, variants and statuses
//! - [`pricing`] - Shipping, tax, coupon discount and order total calculation
//! - [`cart`] - The cart aggregate and its line-item rules
//! - [`checkout`] - The three-step checkout controller and its forms

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod pricing;
pub mod types;

pub use cart::{Cart, CartChange, CartError, CartLine, LineKey, MAX_SUBTOTAL};
pub use checkout::{
    AddressInput, CheckoutError, CheckoutState, CheckoutStep, CustomerForm, CustomerInfo,
    FieldErrors, OrderDraft, PaymentForm, PaymentInfo, PostalAddress, ShippingAddress,
    ShippingForm, ShippingInfo,
};
pub use pricing::{Coupon, CouponBook, CouponError, OrderTotals, PricingPolicy, ShippingMethod};
pub use types::*;
