//! Commerce backend REST client.
//!
//! # Architecture
//!
//! - The backend owns persistence, payments, inventory and authentication
//! - Plain JSON over HTTP with `reqwest`; a bearer token is attached when the
//!   session holds one
//! - Saved addresses and payment methods are cached per token in `moka`
//!   (60 second TTL) and invalidated by every mutation of the same collection
//! - No retries: callers decide whether a failure matters
//!
//! # Example
//!
//! ```rust,ignore
//! use neoshop_storefront::backend::BackendClient;
//!
//! let backend = BackendClient::new(&config.backend)?;
//! let addresses = backend.addresses(&token).await?;
//! ```

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use neoshop_core::{
    AddressId, CartLine, Email, LineKey, OrderDraft, OrderId, PaymentMethodId, PostalAddress,
};

use crate::config::BackendConfig;
use crate::models::AccessToken;

use cache::{CacheKey, CacheValue};
pub use types::{
    Address, LoginOutcome, NewPaymentMethod, Order, OrderLine, PaymentMethod,
    PaymentMethodUpdate, UserDetails, Wallet, WalletTransaction, WalletUse,
};
use types::{LoginResponse, MakeDefault, TwoFactorVerifyRequest};

/// How long saved addresses and payment methods stay cached.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Longest slice of a response body kept in errors and logs.
const MAX_BODY_IN_ERROR: usize = 200;

/// Errors that can occur when calling the commerce backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure, timeout, or client construction error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token is missing, expired or revoked.
    #[error("Unauthorized")]
    Unauthorized,

    /// The resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend answered with something that makes no sense.
    #[error("Unexpected response: {0}")]
    Unexpected(String),

    /// A path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the commerce backend.
///
/// Cheap to clone; clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Http` if the TLS backend cannot be initialised.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("neoshop-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// Resolve a path relative to the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request, attaching the bearer token when there is one.
    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
    ) -> Result<RequestBuilder, BackendError> {
        let builder = self.inner.client.request(method, self.endpoint(path)?);
        Ok(match token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        })
    }

    /// Send a request and return the body of a successful response.
    async fn dispatch(&self, builder: RequestBuilder, path: &str) -> Result<String, BackendError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            let err = error_for_status(status, path, &body);
            if matches!(err, BackendError::Api { .. }) {
                tracing::error!(
                    status = %status,
                    path,
                    body = %truncate(&body, 500),
                    "Backend returned non-success status"
                );
            }
            return Err(err);
        }

        Ok(body)
    }

    /// Send a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, BackendError> {
        let body = self.dispatch(builder, path).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %truncate(&body, 500),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request whose response body does not matter.
    async fn execute_unit(&self, builder: RequestBuilder, path: &str) -> Result<(), BackendError> {
        self.dispatch(builder, path).await.map(drop)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, BackendError> {
        let builder = self.request(Method::GET, path, Some(token))?;
        self.execute(builder, path).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
        body: &B,
    ) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path, token)?.json(body);
        self.execute(builder, path).await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Mirror an added or changed cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, line), fields(product_id = %line.product_id))]
    pub async fn put_cart_line(
        &self,
        token: Option<&AccessToken>,
        line: &CartLine,
    ) -> Result<(), BackendError> {
        let builder = self.request(Method::PUT, "cart", token)?.json(line);
        self.execute_unit(builder, "cart").await
    }

    /// Mirror a removed cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, key), fields(product_id = %key.product_id))]
    pub async fn delete_cart_line(
        &self,
        token: Option<&AccessToken>,
        key: &LineKey,
    ) -> Result<(), BackendError> {
        let builder = self.request(Method::DELETE, "cart", token)?.json(key);
        self.execute_unit(builder, "cart").await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// Saved addresses (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn addresses(&self, token: &AccessToken) -> Result<Vec<Address>, BackendError> {
        let cache_key = CacheKey::Addresses(token.clone());

        if let Some(CacheValue::Addresses(addresses)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for addresses");
            return Ok(addresses);
        }

        let addresses: Vec<Address> = self.get("addresses", token).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Addresses(addresses.clone()))
            .await;

        Ok(addresses)
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, address))]
    pub async fn create_address(
        &self,
        token: &AccessToken,
        address: &PostalAddress,
    ) -> Result<Address, BackendError> {
        let created = self
            .send_json(Method::POST, "addresses", Some(token), address)
            .await;
        self.invalidate(CacheKey::Addresses(token.clone())).await;
        created
    }

    /// Replace a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, address), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        token: &AccessToken,
        id: &AddressId,
        address: &PostalAddress,
    ) -> Result<Address, BackendError> {
        let path = format!("addresses/{}", urlencoding::encode(id.as_str()));
        let updated = self.send_json(Method::PUT, &path, Some(token), address).await;
        self.invalidate(CacheKey::Addresses(token.clone())).await;
        updated
    }

    /// Make a saved address the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn set_default_address(
        &self,
        token: &AccessToken,
        id: &AddressId,
    ) -> Result<Address, BackendError> {
        let path = format!("addresses/{}", urlencoding::encode(id.as_str()));
        let updated = self
            .send_json(
                Method::PATCH,
                &path,
                Some(token),
                &MakeDefault { is_default: true },
            )
            .await;
        self.invalidate(CacheKey::Addresses(token.clone())).await;
        updated
    }

    /// Delete a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn delete_address(
        &self,
        token: &AccessToken,
        id: &AddressId,
    ) -> Result<(), BackendError> {
        let path = format!("addresses/{}", urlencoding::encode(id.as_str()));
        let builder = self.request(Method::DELETE, &path, Some(token))?;
        let deleted = self.execute_unit(builder, &path).await;
        self.invalidate(CacheKey::Addresses(token.clone())).await;
        deleted
    }

    // =========================================================================
    // Payment methods
    // =========================================================================

    /// Saved payment methods (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn payment_methods(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<PaymentMethod>, BackendError> {
        let cache_key = CacheKey::PaymentMethods(token.clone());

        if let Some(CacheValue::PaymentMethods(methods)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for payment methods");
            return Ok(methods);
        }

        let methods: Vec<PaymentMethod> = self.get("payment-methods", token).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::PaymentMethods(methods.clone()))
            .await;

        Ok(methods)
    }

    /// Save a payment method from a provider token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, method))]
    pub async fn create_payment_method(
        &self,
        token: &AccessToken,
        method: &NewPaymentMethod,
    ) -> Result<PaymentMethod, BackendError> {
        let created = self
            .send_json(Method::POST, "payment-methods", Some(token), method)
            .await;
        self.invalidate(CacheKey::PaymentMethods(token.clone())).await;
        created
    }

    /// Edit a saved payment method.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, update), fields(payment_method_id = %id))]
    pub async fn update_payment_method(
        &self,
        token: &AccessToken,
        id: &PaymentMethodId,
        update: &PaymentMethodUpdate,
    ) -> Result<PaymentMethod, BackendError> {
        let path = format!("payment-methods/{}", urlencoding::encode(id.as_str()));
        let updated = self.send_json(Method::PUT, &path, Some(token), update).await;
        self.invalidate(CacheKey::PaymentMethods(token.clone())).await;
        updated
    }

    /// Make a saved payment method the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(payment_method_id = %id))]
    pub async fn set_default_payment_method(
        &self,
        token: &AccessToken,
        id: &PaymentMethodId,
    ) -> Result<PaymentMethod, BackendError> {
        let path = format!("payment-methods/{}", urlencoding::encode(id.as_str()));
        let updated = self
            .send_json(
                Method::PATCH,
                &path,
                Some(token),
                &MakeDefault { is_default: true },
            )
            .await;
        self.invalidate(CacheKey::PaymentMethods(token.clone())).await;
        updated
    }

    /// Delete a saved payment method.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(payment_method_id = %id))]
    pub async fn delete_payment_method(
        &self,
        token: &AccessToken,
        id: &PaymentMethodId,
    ) -> Result<(), BackendError> {
        let path = format!("payment-methods/{}", urlencoding::encode(id.as_str()));
        let builder = self.request(Method::DELETE, &path, Some(token))?;
        let deleted = self.execute_unit(builder, &path).await;
        self.invalidate(CacheKey::PaymentMethods(token.clone())).await;
        deleted
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Order history, newest first as the backend returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn orders(&self, token: &AccessToken) -> Result<Vec<Order>, BackendError> {
        self.get("orders", token).await
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, draft), fields(lines = draft.lines.len()))]
    pub async fn create_order(
        &self,
        token: Option<&AccessToken>,
        draft: &OrderDraft,
    ) -> Result<Order, BackendError> {
        self.send_json(Method::POST, "orders", token, draft).await
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn cancel_order(
        &self,
        token: &AccessToken,
        id: &OrderId,
    ) -> Result<Order, BackendError> {
        let path = format!("orders/{}/cancel", urlencoding::encode(id.as_str()));
        let builder = self.request(Method::POST, &path, Some(token))?;
        self.execute(builder, &path).await
    }

    /// Request a return for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn return_order(
        &self,
        token: &AccessToken,
        id: &OrderId,
    ) -> Result<Order, BackendError> {
        let path = format!("orders/{}/return", urlencoding::encode(id.as_str()));
        let builder = self.request(Method::POST, &path, Some(token))?;
        self.execute(builder, &path).await
    }

    // =========================================================================
    // Wallet
    // =========================================================================

    /// Wallet balance and history.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn wallet(&self, token: &AccessToken) -> Result<Wallet, BackendError> {
        self.get("wallet", token).await
    }

    /// Spend wallet balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(amount = %spend.amount))]
    pub async fn use_wallet(
        &self,
        token: &AccessToken,
        spend: &WalletUse,
    ) -> Result<Wallet, BackendError> {
        self.send_json(Method::POST, "wallet/use", Some(token), spend).await
    }

    // =========================================================================
    // Auth & profile
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` for wrong credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginOutcome, BackendError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let response: LoginResponse = self
            .send_json(Method::POST, "auth/login", None, &body)
            .await?;
        login_outcome(response)
    }

    /// Finish a two-factor login.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` for a wrong or expired code.
    #[instrument(skip(self, challenge_id, code))]
    pub async fn verify_two_factor(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<AccessToken, BackendError> {
        let body = TwoFactorVerifyRequest { challenge_id, code };
        let response: LoginResponse = self
            .send_json(Method::POST, "auth/two-factor-verify", None, &body)
            .await?;
        match login_outcome(response)? {
            LoginOutcome::Authenticated(token) => Ok(token),
            LoginOutcome::TwoFactorRequired { .. } => Err(BackendError::Unexpected(
                "two-factor verification asked for another challenge".to_string(),
            )),
        }
    }

    /// Revoke the token and forget everything cached for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. The cache is cleared either way.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &AccessToken) -> Result<(), BackendError> {
        let builder = self.request(Method::POST, "auth/logout", Some(token))?;
        let result = self.execute_unit(builder, "auth/logout").await;
        self.invalidate(CacheKey::Addresses(token.clone())).await;
        self.invalidate(CacheKey::PaymentMethods(token.clone())).await;
        result
    }

    /// The signed-in customer's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn user_details(&self, token: &AccessToken) -> Result<UserDetails, BackendError> {
        self.get("user/details", token).await
    }

    /// Replace the signed-in customer's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token, details))]
    pub async fn update_user_details(
        &self,
        token: &AccessToken,
        details: &UserDetails,
    ) -> Result<UserDetails, BackendError> {
        self.send_json(Method::PUT, "user/details", Some(token), details)
            .await
    }

    // =========================================================================
    // Cache Management
    // =========================================================================

    async fn invalidate(&self, key: CacheKey) {
        self.inner.cache.invalidate(&key).await;
    }
}

/// Map a non-success status to an error.
fn error_for_status(status: StatusCode, path: &str, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound(path.to_string()),
        _ => BackendError::Api {
            status: status.as_u16(),
            message: api_message(body),
        },
    }
}

/// Prefer a JSON `message`/`error` field, else the raw body, truncated.
fn api_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_owned))
        });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.is_empty() {
        "(empty body)".to_string()
    } else {
        truncate(&message, MAX_BODY_IN_ERROR)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn login_outcome(response: LoginResponse) -> Result<LoginOutcome, BackendError> {
    match response {
        LoginResponse {
            token: Some(token), ..
        } if !token.is_empty() => Ok(LoginOutcome::Authenticated(AccessToken::new(token))),
        LoginResponse {
            two_factor_required: true,
            challenge_id: Some(challenge_id),
            ..
        } => Ok(LoginOutcome::TwoFactorRequired { challenge_id }),
        _ => Err(BackendError::Unexpected(
            "login response had neither a token nor a two-factor challenge".to_string(),
        )),
    }
}
