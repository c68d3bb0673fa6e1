//! Cart route handlers.
//!
//! Every mutation is applied to the session cart first and answered from it.
//! The change is then mirrored to the backend in the background; a failed
//! sync is logged and never changes the response.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use neoshop_core::{
    Cart, CartChange, CartLine, Coupon, LineKey, Money, OrderTotals, PricingPolicy, ProductId,
    ShippingMethod, Variant,
};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalCustomer;
use crate::services::cart_sync;
use crate::services::session_data::{load_cart, load_checkout, save_cart};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line as the client sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub variant_label: Option<String>,
    pub line_total: Money,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            line: line.clone(),
            variant_label: line.variant.label(),
            line_total: line.line_total(),
        }
    }
}

/// The cart with its order summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u64,
    pub coupon: Option<Coupon>,
    /// Inline message for a rejected coupon code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_error: Option<String>,
    pub shipping_method: ShippingMethod,
    pub totals: OrderTotals,
}

impl CartView {
    /// Build the view, pricing the cart with `method`.
    #[must_use]
    pub fn new(cart: &Cart, policy: &PricingPolicy, method: ShippingMethod) -> Self {
        Self {
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            item_count: cart.item_count(),
            coupon: cart.coupon().cloned(),
            coupon_error: None,
            shipping_method: method,
            totals: cart.totals(policy, method),
        }
    }
}

/// Price the cart with the shipping method chosen at checkout (standard
/// until one is chosen).
async fn view(state: &AppState, session: &Session, cart: &Cart) -> Result<CartView> {
    let method = load_checkout(session).await?.shipping_method();
    Ok(CartView::new(cart, state.pricing(), method))
}

// =============================================================================
// Requests
// =============================================================================

/// Query for `GET /cart`.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    /// Price with this method instead of the checkout's choice.
    pub shipping: Option<ShippingMethod>,
}

/// Add to cart request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: Option<u32>,
    #[serde(flatten)]
    pub variant: Variant,
}

/// Set quantity request.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    #[serde(flatten)]
    pub key: LineKey,
    pub quantity: i64,
}

/// Adjust quantity request.
#[derive(Debug, Deserialize)]
pub struct AdjustQuantityRequest {
    #[serde(flatten)]
    pub key: LineKey,
    pub delta: i64,
}

/// Remove line request.
#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    #[serde(flatten)]
    pub key: LineKey,
}

/// Apply coupon request.
#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    #[serde(default)]
    pub code: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    let view = match query.shipping {
        Some(method) => CartView::new(&cart, state.pricing(), method),
        None => view(&state, &session, &cart).await?,
    };
    Ok(Json(view))
}

/// Save the cart, mirror the change, and answer with the new cart.
async fn commit(
    state: &AppState,
    session: &Session,
    customer: OptionalCustomer,
    cart: &Cart,
    change: CartChange,
) -> Result<Json<CartView>> {
    save_cart(session, cart).await?;

    let OptionalCustomer(customer) = customer;
    drop(cart_sync::spawn_sync(
        state.backend().clone(),
        customer.map(|c| c.token),
        change,
    ));

    Ok(Json(view(state, session, cart).await?))
}

/// Add an item, merging with an identical line.
#[instrument(skip(state, session, customer, request), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    customer: OptionalCustomer,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let change = cart.add(CartLine {
        product_id: request.product_id,
        name: request.name,
        unit_price: request.unit_price,
        quantity: request.quantity.unwrap_or(1),
        variant: request.variant,
    })?;

    if let CartChange::Upserted(line) = &change {
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("product_id", line.product_id.as_str())]),
        );
    }

    commit(&state, &session, customer, &cart, change).await
}

/// Set a line's quantity. Quantities below one are rejected.
#[instrument(skip(state, session, customer, request), fields(line = %request.key))]
pub async fn set_quantity(
    State(state): State<AppState>,
    session: Session,
    customer: OptionalCustomer,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let change = cart.update_quantity(&request.key, request.quantity)?;
    commit(&state, &session, customer, &cart, change).await
}

/// Step a line's quantity up or down; dropping below one removes it.
#[instrument(skip(state, session, customer, request), fields(line = %request.key))]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    session: Session,
    customer: OptionalCustomer,
    Json(request): Json<AdjustQuantityRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let change = cart.adjust_quantity(&request.key, request.delta)?;
    commit(&state, &session, customer, &cart, change).await
}

/// Remove a line.
#[instrument(skip(state, session, customer, request), fields(line = %request.key))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    customer: OptionalCustomer,
    Json(request): Json<RemoveItemRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let change = cart.remove(&request.key)?;
    add_breadcrumb(
        "cart",
        "Removed item",
        Some(&[("product_id", request.key.product_id.as_str())]),
    );
    commit(&state, &session, customer, &cart, change).await
}

/// Apply a coupon code.
///
/// A rejected code is reported inline with `200 OK` and clears any coupon
/// that was applied before.
#[instrument(skip(state, session, request))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CouponRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    let coupon_error = cart
        .apply_coupon(&request.code, state.coupons())
        .err()
        .map(|e| e.to_string());
    save_cart(&session, &cart).await?;

    let mut view = view(&state, &session, &cart).await?;
    view.coupon_error = coupon_error;
    Ok(Json(view))
}

/// Remove the applied coupon.
#[instrument(skip(state, session))]
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove_coupon();
    save_cart(&session, &cart).await?;
    Ok(Json(view(&state, &session, &cart).await?))
}
