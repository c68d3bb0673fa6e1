//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Health check
//!
//! # Cart
//! GET  /cart                                - Cart with order summary
//! POST /cart/items                          - Add an item
//! POST /cart/items/quantity                 - Set a line's quantity
//! POST /cart/items/adjust                   - Step a line's quantity
//! POST /cart/items/remove                   - Remove a line
//! POST /cart/coupon                         - Apply a coupon code
//! DELETE /cart/coupon                       - Remove the coupon
//!
//! # Checkout
//! GET  /checkout                            - Checkout progress
//! POST /checkout/step                       - Jump to a step
//! POST /checkout/back                       - Go back one step
//! POST /checkout/customer                   - Submit contact details
//! POST /checkout/shipping                   - Submit address and method
//! POST /checkout/payment                    - Submit payment choice
//! POST /checkout/submit                     - Place the order
//!
//! # Auth
//! POST /auth/login                          - Sign in
//! POST /auth/two-factor-verify              - Finish a two-factor sign in
//! POST /auth/logout                         - Sign out
//!
//! # Account (requires auth)
//! GET|PUT  /account/details                 - Profile
//! GET|POST /account/addresses               - Saved addresses
//! PUT|DELETE /account/addresses/{id}        - Edit or delete an address
//! PATCH /account/addresses/{id}             - Make an address the default
//! GET|POST /account/payment-methods         - Saved payment methods
//! PUT|DELETE /account/payment-methods/{id}  - Edit or delete a method
//! PATCH /account/payment-methods/{id}       - Make a method the default
//! GET  /account/orders                      - Order history
//! POST /account/orders/{id}/cancel          - Cancel an order
//! POST /account/orders/{id}/return          - Request a return
//! GET  /account/wallet                      - Wallet balance and history
//! POST /account/wallet/use                  - Spend wallet balance
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::backend::BackendError;
use crate::error::AppError;
use crate::state::AppState;

/// Result of loading backend data for display.
///
/// A failed load is not an error response: the page still renders, with
/// `data` empty and a generic message in `error`. An expired token is the
/// exception and surfaces as `401` so the client can sign in again.
#[derive(Debug, Clone, Serialize)]
pub struct Loaded<T> {
    pub data: Option<T>,
    pub error: Option<&'static str>,
}

impl<T> Loaded<T> {
    /// Wrap a backend result, replacing failures with `message`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` when the backend rejected the token.
    pub fn from_result(
        result: Result<T, BackendError>,
        message: &'static str,
    ) -> Result<Self, AppError> {
        match result {
            Ok(data) => Ok(Self {
                data: Some(data),
                error: None,
            }),
            Err(BackendError::Unauthorized) => Err(BackendError::Unauthorized.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Backend load failed");
                Ok(Self {
                    data: None,
                    error: Some(message),
                })
            }
        }
    }

    /// Transform the loaded data.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Loaded<U> {
        Loaded {
            data: self.data.map(f),
            error: self.error,
        }
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/quantity", post(cart::set_quantity))
        .route("/items/adjust", post(cart::adjust_quantity))
        .route("/items/remove", post(cart::remove))
        .route(
            "/coupon",
            post(cart::apply_coupon).delete(cart::remove_coupon),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/step", post(checkout::go_to_step))
        .route("/back", post(checkout::back))
        .route("/customer", post(checkout::submit_customer))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/payment", post(checkout::submit_payment))
        .route("/submit", post(checkout::submit_order))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/two-factor-verify", post(auth::verify_two_factor))
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/details",
            get(account::details).put(account::update_details),
        )
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            axum::routing::put(account::update_address)
                .patch(account::set_default_address)
                .delete(account::delete_address),
        )
        .route(
            "/payment-methods",
            get(account::payment_methods).post(account::create_payment_method),
        )
        .route(
            "/payment-methods/{id}",
            axum::routing::put(account::update_payment_method)
                .patch(account::set_default_payment_method)
                .delete(account::delete_payment_method),
        )
        .route("/orders", get(orders::index))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/return", post(orders::request_return))
        .route("/wallet", get(account::wallet))
        .route("/wallet/use", post(account::use_wallet))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_hides_backend_failures() {
        let loaded = Loaded::<u32>::from_result(
            Err(BackendError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
            "Try again",
        )
        .unwrap();
        assert!(loaded.data.is_none());
        assert_eq!(loaded.error, Some("Try again"));

        let json = serde_json::to_value(&loaded).unwrap();
        assert_eq!(json, serde_json::json!({ "data": null, "error": "Try again" }));
    }

    #[test]
    fn test_loaded_propagates_unauthorized() {
        let result = Loaded::<u32>::from_result(Err(BackendError::Unauthorized), "Try again");
        assert!(matches!(
            result,
            Err(AppError::Backend(BackendError::Unauthorized))
        ));
    }

    #[test]
    fn test_loaded_map() {
        let loaded = Loaded::from_result(Ok(vec![1, 2, 3]), "x").unwrap();
        let mapped = loaded.map(|v| v.len());
        assert_eq!(mapped.data, Some(3));
        assert!(mapped.error.is_none());
    }
}
