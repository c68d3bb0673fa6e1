//! Request and response bodies of the commerce backend REST API.
//!
//! All bodies are JSON with `camelCase` keys. Unknown response fields are
//! ignored so the backend can grow without breaking the storefront.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use neoshop_core::{
    AddressId, CustomerInfo, Email, Money, OrderId, OrderStatus, PaymentMethodId, PostalAddress,
    ProductId, Variant,
};

use crate::models::AccessToken;

// ─────────────────────────────────────────────────────────────────────────────
// Addresses
// ─────────────────────────────────────────────────────────────────────────────

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    #[serde(flatten)]
    pub address: PostalAddress,
    #[serde(default)]
    pub is_default: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment methods
// ─────────────────────────────────────────────────────────────────────────────

/// A saved payment method. Card numbers never reach the storefront; the
/// backend only reports brand and last four digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub brand: String,
    pub last4: String,
    pub holder_name: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    #[serde(default)]
    pub is_default: bool,
}

/// Body for creating a payment method from a payment-provider token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentMethod {
    /// Opaque token from the payment provider's hosted fields.
    pub provider_token: String,
    pub holder_name: String,
}

/// Body for editing a payment method's mutable details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodUpdate {
    pub holder_name: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
}

/// Body of the `PATCH` that makes an address or payment method the default.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MakeDefault {
    pub is_default: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(flatten)]
    pub variant: Variant,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub total: Money,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wallet
// ─────────────────────────────────────────────────────────────────────────────

/// A movement of store credit. Negative amounts are spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// The customer's store-credit wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub balance: Money,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

/// Body for spending wallet balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUse {
    pub amount: Money,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth & profile
// ─────────────────────────────────────────────────────────────────────────────

/// What the backend answered to a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Signed in.
    Authenticated(AccessToken),
    /// A second factor is needed to finish signing in.
    TwoFactorRequired { challenge_id: String },
}

/// Raw login or two-factor response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub token: Option<String>,
    #[serde(default)]
    pub two_factor_required: bool,
    pub challenge_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TwoFactorVerifyRequest<'a> {
    pub challenge_id: &'a str,
    pub code: &'a str,
}

/// The signed-in customer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<CustomerInfo> for UserDetails {
    fn from(info: CustomerInfo) -> Self {
        Self {
            email: info.email,
            first_name: info.first_name,
            last_name: info.last_name,
            phone: info.phone,
        }
    }
}
