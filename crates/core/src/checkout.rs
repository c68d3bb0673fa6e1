//! The three-step checkout controller.
//!
//! ```text
//! customer --continue--> shipping --continue--> payment
//!    ^                      |  ^                   |
//!    +--------back----------+  +-------back--------+
//! ```
//!
//! Each step has a form. A form is validated in full before anything is
//! stored: an invalid submission returns [`FieldErrors`] and leaves the
//! [`CheckoutState`] exactly as it was. `go_to_step` moves anywhere without
//! checking that earlier steps are complete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartLine};
use crate::pricing::{OrderTotals, PricingPolicy, ShippingMethod};
use crate::types::{AddressId, Email, PaymentMethodId};

const MAX_NAME_LENGTH: usize = 100;

/// One of the sequential checkout stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Customer,
    Shipping,
    Payment,
}

impl CheckoutStep {
    /// All steps, in order.
    pub const ALL: [Self; 3] = [Self::Customer, Self::Shipping, Self::Payment];

    /// The step after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Customer => Some(Self::Shipping),
            Self::Shipping => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// The step before this one, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Customer => None,
            Self::Shipping => Some(Self::Customer),
            Self::Payment => Some(Self::Shipping),
        }
    }

    /// Wire name of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Shipping => "shipping",
            Self::Payment => "payment",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckoutStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "shipping" => Ok(Self::Shipping),
            "payment" => Ok(Self::Payment),
            _ => Err(format!("invalid checkout step: {s}")),
        }
    }
}

// =============================================================================
// Field errors
// =============================================================================

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// No errors.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record a message for a field. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// The message for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether there are no errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(value)` if no errors were recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for FieldErrors {}

fn required(errors: &mut FieldErrors, field: &str, label: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, format!("{label} is required"));
        return None;
    }
    if value.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            field,
            format!("{label} must be at most {MAX_NAME_LENGTH} characters"),
        );
        return None;
    }
    Some(value.to_owned())
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=15).contains(&digits) && phone.len() <= 20
}

fn valid_postal_code(code: &str) -> bool {
    (3..=10).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
}

// =============================================================================
// Customer step
// =============================================================================

/// Contact details submitted at the customer step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Validated contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl CustomerForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> Result<CustomerInfo, FieldErrors> {
        let mut errors = FieldErrors::new();

        let email = Email::parse(&self.email)
            .map_err(|e| errors.add("email", e.to_string()))
            .ok();
        let first_name = required(&mut errors, "firstName", "First name", &self.first_name);
        let last_name = required(&mut errors, "lastName", "Last name", &self.last_name);
        let phone = optional(self.phone.as_deref());
        if let Some(phone) = &phone
            && !valid_phone(phone)
        {
            errors.add("phone", "Enter a valid phone number");
        }

        match (email, first_name, last_name) {
            (Some(email), Some(first_name), Some(last_name)) => errors.into_result(CustomerInfo {
                email,
                first_name,
                last_name,
                phone,
            }),
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Shipping step
// =============================================================================

/// A new address typed into a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A validated postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl AddressInput {
    /// Validate the address, prefixing field names with `prefix` (e.g.
    /// `address.city`) when it is non-empty.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self, prefix: &str) -> Result<PostalAddress, FieldErrors> {
        let mut errors = FieldErrors::new();
        let field = |name: &str| {
            if prefix.is_empty() {
                name.to_owned()
            } else {
                format!("{prefix}.{name}")
            }
        };

        let mut require = |name: &str, label: &str, value: &str| {
            required(&mut errors, &field(name), label, value)
        };
        let first_name = require("firstName", "First name", &self.first_name);
        let last_name = require("lastName", "Last name", &self.last_name);
        let line1 = require("line1", "Address", &self.line1);
        let city = require("city", "City", &self.city);
        let region = require("region", "State / region", &self.region);
        let country = require("country", "Country", &self.country);

        let postal_code = self.postal_code.trim().to_ascii_uppercase();
        if postal_code.is_empty() {
            errors.add(field("postalCode"), "Postal code is required");
        } else if !valid_postal_code(&postal_code) {
            errors.add(field("postalCode"), "Enter a valid postal code");
        }

        let phone = optional(self.phone.as_deref());
        if let Some(phone) = &phone
            && !valid_phone(phone)
        {
            errors.add(field("phone"), "Enter a valid phone number");
        }

        match (first_name, last_name, line1, city, region, country) {
            (
                Some(first_name),
                Some(last_name),
                Some(line1),
                Some(city),
                Some(region),
                Some(country),
            ) => errors.into_result(PostalAddress {
                first_name,
                last_name,
                line1,
                line2: optional(self.line2.as_deref()),
                city,
                region,
                postal_code,
                country,
                phone,
            }),
            _ => Err(errors),
        }
    }
}

/// Where the order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShippingAddress {
    /// One of the customer's saved addresses.
    Saved { id: AddressId },
    /// An address entered during checkout.
    New { address: PostalAddress },
}

/// Submission of the shipping step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    /// A saved address to ship to.
    #[serde(default)]
    pub address_id: Option<String>,
    /// Or a new address.
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub method: Option<ShippingMethod>,
}

/// Validated shipping choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: ShippingAddress,
    pub method: ShippingMethod,
}

impl ShippingForm {
    /// Validate against the customer's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns field errors when no (or two) address choices are given, the
    /// saved address is unknown, the new address is incomplete, or no
    /// shipping method was chosen.
    pub fn validate(&self, saved: &[AddressId]) -> Result<ShippingInfo, FieldErrors> {
        let mut errors = FieldErrors::new();

        let address_id = optional(self.address_id.as_deref());
        let address = match (address_id, &self.address) {
            (Some(_), Some(_)) => {
                errors.add(
                    "address",
                    "Choose a saved address or enter a new one, not both",
                );
                None
            }
            (None, None) => {
                errors.add("address", "Select a shipping address");
                None
            }
            (Some(id), None) => {
                let id = AddressId::new(id);
                if saved.contains(&id) {
                    Some(ShippingAddress::Saved { id })
                } else {
                    errors.add("addressId", "Select one of your saved addresses");
                    None
                }
            }
            (None, Some(input)) => match input.validate("address") {
                Ok(address) => Some(ShippingAddress::New { address }),
                Err(address_errors) => {
                    for (field, message) in address_errors.iter() {
                        errors.add(field, message);
                    }
                    None
                }
            },
        };

        if self.method.is_none() {
            errors.add("method", "Select a shipping method");
        }

        match (address, self.method) {
            (Some(address), Some(method)) => errors.into_result(ShippingInfo { address, method }),
            _ => Err(errors),
        }
    }
}

// =============================================================================
// Payment step
// =============================================================================

/// How the order is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentInfo {
    /// A payment method saved with the backend.
    SavedMethod { id: PaymentMethodId },
    /// The customer's store wallet balance.
    Wallet,
}

/// Submission of the payment step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentForm {
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub use_wallet: bool,
}

impl PaymentForm {
    /// Validate against the customer's saved payment methods.
    ///
    /// # Errors
    ///
    /// Returns field errors when nothing (or both a method and the wallet)
    /// is selected, or the method is unknown.
    pub fn validate(&self, saved: &[PaymentMethodId]) -> Result<PaymentInfo, FieldErrors> {
        let mut errors = FieldErrors::new();
        let id = optional(self.payment_method_id.as_deref());

        let info = match (id, self.use_wallet) {
            (Some(_), true) => {
                errors.add(
                    "paymentMethodId",
                    "Pay with a saved method or your wallet, not both",
                );
                None
            }
            (None, false) => {
                errors.add("paymentMethodId", "Select a payment method");
                None
            }
            (None, true) => Some(PaymentInfo::Wallet),
            (Some(id), false) => {
                let id = PaymentMethodId::new(id);
                if saved.contains(&id) {
                    Some(PaymentInfo::SavedMethod { id })
                } else {
                    errors.add(
                        "paymentMethodId",
                        "Select one of your saved payment methods",
                    );
                    None
                }
            }
        };

        info.ok_or(errors)
    }
}

// =============================================================================
// Checkout state
// =============================================================================

/// Why an order cannot be placed yet.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("your cart is empty")]
    EmptyCart,
    /// A step has not been completed.
    #[error("the {0} step is not complete")]
    Incomplete(CheckoutStep),
}

/// Accumulated checkout progress for one shopper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutState {
    step: CheckoutStep,
    customer: Option<CustomerInfo>,
    shipping: Option<ShippingInfo>,
    payment: Option<PaymentInfo>,
}

impl CheckoutState {
    /// A fresh checkout at the customer step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Contact details, once the customer step is done.
    #[must_use]
    pub const fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    /// Shipping choice, once the shipping step is done.
    #[must_use]
    pub const fn shipping(&self) -> Option<&ShippingInfo> {
        self.shipping.as_ref()
    }

    /// Payment choice, once the payment step is done.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentInfo> {
        self.payment.as_ref()
    }

    /// The chosen shipping method, or standard until one is chosen.
    #[must_use]
    pub fn shipping_method(&self) -> ShippingMethod {
        self.shipping
            .as_ref()
            .map_or(ShippingMethod::Standard, |s| s.method)
    }

    /// Jump to any step. Earlier steps are not required to be complete.
    pub const fn go_to_step(&mut self, step: CheckoutStep) {
        self.step = step;
    }

    /// Move one step back; stays on the first step.
    pub fn back(&mut self) -> CheckoutStep {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.step
    }

    /// Submit the customer step and advance to shipping.
    ///
    /// # Errors
    ///
    /// Returns field errors and leaves the state unchanged if invalid.
    pub fn complete_customer(&mut self, form: &CustomerForm) -> Result<(), FieldErrors> {
        let info = form.validate()?;
        self.customer = Some(info);
        self.step = CheckoutStep::Shipping;
        Ok(())
    }

    /// Submit the shipping step and advance to payment.
    ///
    /// # Errors
    ///
    /// Returns field errors and leaves the state unchanged unless a valid
    /// address and method were selected.
    pub fn complete_shipping(
        &mut self,
        form: &ShippingForm,
        saved_addresses: &[AddressId],
    ) -> Result<(), FieldErrors> {
        let info = form.validate(saved_addresses)?;
        self.shipping = Some(info);
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Submit the payment step. The controller stays on payment.
    ///
    /// # Errors
    ///
    /// Returns field errors and leaves the state unchanged if invalid.
    pub fn complete_payment(
        &mut self,
        form: &PaymentForm,
        saved_methods: &[PaymentMethodId],
    ) -> Result<(), FieldErrors> {
        let info = form.validate(saved_methods)?;
        self.payment = Some(info);
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Whether every step has been completed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.customer.is_some() && self.shipping.is_some() && self.payment.is_some()
    }

    /// Build the order-creation payload from the cart and the collected
    /// forms.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] for an empty cart, otherwise
    /// [`CheckoutError::Incomplete`] naming the first unfinished step.
    pub fn order_draft(
        &self,
        cart: &Cart,
        policy: &PricingPolicy,
    ) -> Result<OrderDraft, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let customer = self
            .customer
            .clone()
            .ok_or(CheckoutError::Incomplete(CheckoutStep::Customer))?;
        let shipping = self
            .shipping
            .clone()
            .ok_or(CheckoutError::Incomplete(CheckoutStep::Shipping))?;
        let payment = self
            .payment
            .clone()
            .ok_or(CheckoutError::Incomplete(CheckoutStep::Payment))?;

        Ok(OrderDraft {
            customer,
            shipping_address: shipping.address,
            shipping_method: shipping.method,
            payment,
            lines: cart.lines().to_vec(),
            coupon_code: cart.coupon().map(|c| c.code.clone()),
            totals: cart.totals(policy, shipping.method),
        })
    }
}

/// Everything the backend needs to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub customer: CustomerInfo,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub payment: PaymentInfo,
    pub lines: Vec<CartLine>,
    pub coupon_code: Option<String>,
    pub totals: OrderTotals,
}

impl OrderDraft {
    /// Whether the order relies on the signed-in customer's saved address,
    /// saved payment method or wallet.
    #[must_use]
    pub const fn uses_saved_details(&self) -> bool {
        matches!(self.shipping_address, ShippingAddress::Saved { .. })
            || matches!(
                self.payment,
                PaymentInfo::SavedMethod { .. } | PaymentInfo::Wallet
            )
    }
}
