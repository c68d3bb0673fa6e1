//! Session-related types.
//!
//! Everything a shopper accumulates between requests lives in the
//! server-side session: the cart, checkout progress, and the backend access
//! token once they have signed in.

use serde::{Deserialize, Serialize};

use neoshop_core::Email;

/// Bearer token issued by the commerce backend at login.
///
/// `Debug` is redacted so tokens never reach logs or Sentry.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// A signed-in shopper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Backend access token.
    pub token: AccessToken,
    /// Email used to sign in.
    pub email: Email,
}

/// A login waiting for its second factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorChallenge {
    /// Challenge id issued by the backend.
    pub challenge_id: String,
    /// Email the login was started with.
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for checkout progress.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the signed-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";

    /// Key for a pending two-factor challenge.
    pub const TWO_FACTOR_CHALLENGE: &str = "two_factor_challenge";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("tok_live_123");
        assert_eq!(format!("{token:?}"), "AccessToken([REDACTED])");
        assert_eq!(token.as_str(), "tok_live_123");
    }

    #[test]
    fn test_current_customer_round_trips_through_session_json() {
        let customer = CurrentCustomer {
            token: AccessToken::new("tok"),
            email: Email::parse("sam@example.com").unwrap(),
        };
        let json = serde_json::to_value(&customer).unwrap();
        assert_eq!(json["token"], "tok");

        let back: CurrentCustomer = serde_json::from_value(json).unwrap();
        assert_eq!(back.token, customer.token);
    }
}
