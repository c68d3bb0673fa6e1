//! Cache types for per-customer backend responses.

use crate::backend::types::{Address, PaymentMethod};
use crate::models::AccessToken;

/// Cache key: one entry per collection per access token.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Addresses(AccessToken),
    PaymentMethods(AccessToken),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Addresses(Vec<Address>),
    PaymentMethods(Vec<PaymentMethod>),
}
