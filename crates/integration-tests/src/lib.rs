//! End-to-end test harness for the NeoShop storefront.
//!
//! Every test gets its own storefront on an ephemeral port, wired to a fake
//! commerce backend that answers with canned data and records each call it
//! receives.
//!
//! # Canned backend data
//!
//! | Login                 | Password  | Result                                 |
//! |-----------------------|-----------|----------------------------------------|
//! | `sam@example.com`     | `hunter2` | token `tok_sam`                        |
//! | `twofa@example.com`   | `hunter2` | challenge `ch_1`, code `123456`        |
//! | `broken@example.com`  | `hunter2` | token `tok_broken`; every load is 500  |
//!
//! Saved address `addr_1`, saved payment method `pm_1`.
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = TestContext::new().await;
//! ctx.login("sam@example.com").await;
//! let resp = ctx.get("/account/addresses").await;
//! assert_eq!(resp.status(), 200);
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::IntoResponse,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use neoshop_core::Money;
use neoshop_storefront::config::{BackendConfig, StorefrontConfig};
use neoshop_storefront::state::AppState;

/// Password accepted for every canned customer.
pub const PASSWORD: &str = "hunter2";

/// Code that completes the two-factor challenge.
pub const TWO_FACTOR_CODE: &str = "123456";

// =============================================================================
// Fake backend
// =============================================================================

/// A request the fake backend received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    /// Path relative to the API base, e.g. `cart` or `orders/ord_1/cancel`.
    pub path: String,
    /// Bearer token, if one was sent.
    pub token: Option<String>,
    pub body: Value,
}

/// Fake commerce backend.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeBackend {
    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls received for `method` and `path`.
    #[must_use]
    pub fn calls_to(&self, method: &str, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }

    /// Wait for a call that may be sent in the background.
    ///
    /// # Panics
    ///
    /// Panics if no such call arrives within two seconds.
    pub async fn wait_for_call(&self, method: &str, path: &str) -> RecordedCall {
        for _ in 0..100 {
            if let Some(call) = self.calls_to(method, path).pop() {
                return call;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("backend never received {method} {path}; got {:?}", self.calls());
    }

    async fn spawn(self) -> SocketAddr {
        let app = Router::new().fallback(handle).with_state(self);
        serve(app).await
    }
}

async fn handle(
    State(fake): State<FakeBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri
        .path()
        .trim_start_matches('/')
        .trim_start_matches("api/")
        .to_string();
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let (status, response) = respond(method.as_str(), &path, token.as_deref(), &body);

    if let Ok(mut calls) = fake.calls.lock() {
        calls.push(RecordedCall {
            method: method.to_string(),
            path,
            token,
            body,
        });
    }

    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        response.to_string(),
    )
}

fn respond(method: &str, path: &str, token: Option<&str>, body: &Value) -> (StatusCode, Value) {
    // Unauthenticated endpoints
    match (method, path) {
        ("PUT" | "DELETE", "cart") => return (StatusCode::OK, json!({})),
        ("POST", "auth/login") => return login(body),
        ("POST", "auth/two-factor-verify") => {
            return if body["challengeId"] == "ch_1" && body["code"] == TWO_FACTOR_CODE {
                (StatusCode::OK, json!({ "token": "tok_twofa" }))
            } else {
                (StatusCode::UNAUTHORIZED, json!({ "message": "Invalid code" }))
            };
        }
        ("POST", "orders") => return (StatusCode::CREATED, placed_order(body)),
        _ => {}
    }

    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, json!({ "message": "Missing token" }));
    };
    if token == "tok_broken" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "database unavailable" }),
        );
    }

    match (method, path) {
        ("POST", "auth/logout") => (StatusCode::OK, json!({})),
        ("GET", "addresses") => (StatusCode::OK, json!([address()])),
        ("POST", "addresses") => {
            let mut created = body.clone();
            created["id"] = json!("addr_2");
            (StatusCode::CREATED, created)
        }
        ("DELETE", "addresses/addr_1") => (StatusCode::OK, json!({})),
        ("GET", "payment-methods") => (StatusCode::OK, json!([payment_method()])),
        ("GET", "orders") => (StatusCode::OK, json!([order("ord_1", "delivered")])),
        ("POST", "orders/ord_1/cancel") => (StatusCode::OK, order("ord_1", "cancelled")),
        ("GET", "user/details") => (
            StatusCode::OK,
            json!({
                "email": "sam@example.com",
                "firstName": "Sam",
                "lastName": "Rivera",
                "phone": null
            }),
        ),
        ("GET", "wallet") => (
            StatusCode::OK,
            json!({ "balance": "25.00", "transactions": [] }),
        ),
        _ => (StatusCode::NOT_FOUND, json!({ "message": "Not found" })),
    }
}

fn login(body: &Value) -> (StatusCode, Value) {
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Invalid credentials" }),
        );
    }
    match body["email"].as_str() {
        Some("sam@example.com") => (StatusCode::OK, json!({ "token": "tok_sam" })),
        Some("broken@example.com") => (StatusCode::OK, json!({ "token": "tok_broken" })),
        Some("twofa@example.com") => (
            StatusCode::OK,
            json!({ "twoFactorRequired": true, "challengeId": "ch_1" }),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            json!({ "message": "Invalid credentials" }),
        ),
    }
}

fn address() -> Value {
    json!({
        "id": "addr_1",
        "firstName": "Sam",
        "lastName": "Rivera",
        "line1": "1 Main St",
        "line2": null,
        "city": "Springfield",
        "region": "IL",
        "postalCode": "62701",
        "country": "US",
        "phone": null,
        "isDefault": true
    })
}

fn payment_method() -> Value {
    json!({
        "id": "pm_1",
        "brand": "visa",
        "last4": "4242",
        "holderName": "Sam Rivera",
        "expiryMonth": 12,
        "expiryYear": 2030,
        "isDefault": true
    })
}

fn order(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "placedAt": "2026-01-15T10:00:00Z",
        "total": "92.39",
        "lines": []
    })
}

fn placed_order(draft: &Value) -> Value {
    json!({
        "id": "ord_new",
        "status": "pending",
        "placedAt": "2026-01-15T10:00:00Z",
        "total": draft["totals"]["total"],
        "lines": []
    })
}

// =============================================================================
// Test context
// =============================================================================

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// A storefront wired to a fresh fake backend, plus a cookie-keeping client.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub backend: FakeBackend,
}

impl TestContext {
    /// Start a fake backend and a storefront in front of it.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot be started.
    pub async fn new() -> Self {
        let backend = FakeBackend::default();
        let backend_addr = backend.clone().spawn().await;

        let backend_config = BackendConfig::new(&format!("http://{backend_addr}/api"))
            .expect("Invalid fake backend URL");
        let state = AppState::new(StorefrontConfig::new(backend_config))
            .expect("Failed to build application state");
        let addr = serve(neoshop_storefront::app(state)).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: format!("http://{addr}"),
            backend,
        }
    }

    /// Absolute URL of a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET` a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed")
    }

    /// Send a JSON body to a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &Value,
    ) -> reqwest::Response {
        self.client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .expect("request failed")
    }

    /// `POST` a JSON body to a storefront path.
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.send(reqwest::Method::POST, path, body).await
    }

    /// Sign in with the canned password.
    pub async fn login(&self, email: &str) -> reqwest::Response {
        self.post(
            "/auth/login",
            &json!({ "email": email, "password": PASSWORD }),
        )
        .await
    }

    /// Add an item to the cart.
    pub async fn add_item(
        &self,
        product_id: &str,
        unit_price: &str,
        quantity: u32,
    ) -> reqwest::Response {
        self.post(
            "/cart/items",
            &json!({
                "productId": product_id,
                "name": product_id,
                "unitPrice": unit_price,
                "quantity": quantity,
                "color": "black",
                "size": "M"
            }),
        )
        .await
    }
}

/// Read a JSON response body.
///
/// # Panics
///
/// Panics if the body is not JSON.
pub async fn json_body(response: reqwest::Response) -> Value {
    response.json().await.expect("response was not JSON")
}

/// Read a money amount from a JSON value.
///
/// # Panics
///
/// Panics if the value is not a money string.
#[must_use]
pub fn money(value: &Value) -> Money {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("not a money value: {value}"))
}
