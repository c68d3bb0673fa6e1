//! Application state shared across handlers.

use std::sync::Arc;

use neoshop_core::{CouponBook, PricingPolicy};

use crate::backend::{BackendClient, BackendError};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend client, pricing rules and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    coupons: CouponBook,
}

impl AppState {
    /// Create a new application state with the default coupon book.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        Self::with_coupons(config, CouponBook::default())
    }

    /// Create a new application state with a custom coupon book.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn with_coupons(
        config: StorefrontConfig,
        coupons: CouponBook,
    ) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                coupons,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce backend client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get the pricing rules.
    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.config.pricing
    }

    /// Get the accepted coupon codes.
    #[must_use]
    pub fn coupons(&self) -> &CouponBook {
        &self.inner.coupons
    }
}
