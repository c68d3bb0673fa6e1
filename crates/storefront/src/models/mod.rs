//! Domain models for storefront.

pub mod session;

pub use session::{AccessToken, CurrentCustomer, TwoFactorChallenge, keys as session_keys};
