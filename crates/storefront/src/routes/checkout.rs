//! Checkout route handlers.
//!
//! Drives the customer → shipping → payment controller held in the session.
//! Invalid submissions answer `422` with per-field messages and leave the
//! stored checkout untouched.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use neoshop_core::{
    AddressId, Cart, CheckoutState, CheckoutStep, CustomerForm, CustomerInfo, FieldErrors,
    PaymentForm, PaymentInfo, PaymentMethodId, ShippingForm, ShippingInfo,
};

use crate::backend::{Address, PaymentMethod};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalCustomer;
use crate::models::CurrentCustomer;
use crate::routes::cart::CartView;
use crate::routes::orders::OrderView;
use crate::services::session_data::{clear_order_state, load_cart, load_checkout, save_checkout};
use crate::state::AppState;

/// Shown when saved details could not be loaded for the active step.
pub const SAVED_DETAILS_UNAVAILABLE: &str =
    "We couldn't load your saved details. You can still enter them below.";

/// Checkout progress plus what the active step needs to render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub customer: Option<CustomerInfo>,
    pub shipping: Option<ShippingInfo>,
    pub payment: Option<PaymentInfo>,
    pub complete: bool,
    pub cart: CartView,
    /// Saved addresses, at the shipping step for signed-in customers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_addresses: Option<Vec<Address>>,
    /// Saved payment methods, at the payment step for signed-in customers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_payment_methods: Option<Vec<PaymentMethod>>,
    /// Whether paying from the wallet is offered.
    pub wallet_available: bool,
    /// Inline loading message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Build the view, fetching saved data for the active step.
async fn view(
    state: &AppState,
    customer: Option<&CurrentCustomer>,
    checkout: &CheckoutState,
    cart: &Cart,
) -> CheckoutView {
    let mut notice = None;
    let mut saved_addresses = None;
    let mut saved_payment_methods = None;

    if let Some(customer) = customer {
        match checkout.step() {
            CheckoutStep::Customer => {}
            CheckoutStep::Shipping => match state.backend().addresses(&customer.token).await {
                Ok(addresses) => saved_addresses = Some(addresses),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load saved addresses");
                    saved_addresses = Some(Vec::new());
                    notice = Some(SAVED_DETAILS_UNAVAILABLE);
                }
            },
            CheckoutStep::Payment => match state.backend().payment_methods(&customer.token).await {
                Ok(methods) => saved_payment_methods = Some(methods),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load saved payment methods");
                    saved_payment_methods = Some(Vec::new());
                    notice = Some(SAVED_DETAILS_UNAVAILABLE);
                }
            },
        }
    }

    CheckoutView {
        step: checkout.step(),
        customer: checkout.customer().cloned(),
        shipping: checkout.shipping().cloned(),
        payment: checkout.payment().cloned(),
        complete: checkout.is_complete(),
        cart: CartView::new(cart, state.pricing(), checkout.shipping_method()),
        saved_addresses,
        saved_payment_methods,
        wallet_available: customer.is_some(),
        notice,
    }
}

/// Store the checkout and answer with its view.
async fn respond(
    state: &AppState,
    session: &Session,
    customer: Option<&CurrentCustomer>,
    checkout: &CheckoutState,
) -> Result<Json<CheckoutView>> {
    save_checkout(session, checkout).await?;
    let cart = load_cart(session).await?;
    Ok(Json(view(state, customer, checkout, &cart).await))
}

/// Jump-to-step request.
#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: CheckoutStep,
}

/// Show checkout progress.
#[instrument(skip(state, session, customer))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
) -> Result<Json<CheckoutView>> {
    let checkout = load_checkout(&session).await?;
    let cart = load_cart(&session).await?;
    Ok(Json(view(&state, customer.as_ref(), &checkout, &cart).await))
}

/// Jump to any step. Earlier steps need not be complete.
#[instrument(skip(state, session, customer))]
pub async fn go_to_step(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
    Json(request): Json<StepRequest>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    checkout.go_to_step(request.step);
    respond(&state, &session, customer.as_ref(), &checkout).await
}

/// Go back one step.
#[instrument(skip(state, session, customer))]
pub async fn back(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    checkout.back();
    respond(&state, &session, customer.as_ref(), &checkout).await
}

/// Submit contact details.
#[instrument(skip(state, session, customer, form))]
pub async fn submit_customer(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
    Json(form): Json<CustomerForm>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    checkout.complete_customer(&form)?;
    respond(&state, &session, customer.as_ref(), &checkout).await
}

/// Submit the shipping address and method.
///
/// A saved address id is checked against the customer's saved addresses,
/// fetched from the backend.
#[instrument(skip(state, session, customer, form))]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
    Json(form): Json<ShippingForm>,
) -> Result<Json<CheckoutView>> {
    let saved: Vec<AddressId> = match (&customer, &form.address_id) {
        (Some(customer), Some(_)) => state
            .backend()
            .addresses(&customer.token)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect(),
        _ => Vec::new(),
    };

    let mut checkout = load_checkout(&session).await?;
    checkout.complete_shipping(&form, &saved)?;
    respond(&state, &session, customer.as_ref(), &checkout).await
}

/// Submit the payment choice.
///
/// Paying from the wallet needs a signed-in customer; a saved method id is
/// checked against the customer's saved payment methods.
#[instrument(skip(state, session, customer, form))]
pub async fn submit_payment(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
    Json(form): Json<PaymentForm>,
) -> Result<Json<CheckoutView>> {
    if form.use_wallet && customer.is_none() {
        let mut errors = FieldErrors::new();
        errors.add("useWallet", "Sign in to pay with your wallet");
        return Err(errors.into());
    }

    let saved: Vec<PaymentMethodId> = match (&customer, &form.payment_method_id) {
        (Some(customer), Some(_)) => state
            .backend()
            .payment_methods(&customer.token)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect(),
        _ => Vec::new(),
    };

    let mut checkout = load_checkout(&session).await?;
    checkout.complete_payment(&form, &saved)?;
    respond(&state, &session, customer.as_ref(), &checkout).await
}

/// Response to a placed order.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub order: OrderView,
}

/// Place the order.
///
/// On success the cart and checkout are cleared from the session.
#[instrument(skip(state, session, customer))]
pub async fn submit_order(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let cart = load_cart(&session).await?;
    let checkout = load_checkout(&session).await?;
    let draft = checkout.order_draft(&cart, state.pricing())?;
    if customer.is_none() && draft.uses_saved_details() {
        return Err(AppError::Unauthorized(
            "Please sign in to use your saved details".to_string(),
        ));
    }

    let order = state
        .backend()
        .create_order(customer.as_ref().map(|c| &c.token), &draft)
        .await?;

    clear_order_state(&session).await?;
    add_breadcrumb(
        "checkout",
        "Placed order",
        Some(&[("order_id", order.id.as_str())]),
    );
    tracing::info!(order_id = %order.id, total = %order.total, "Order placed");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            order: OrderView::from(order),
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use neoshop_core::{CartLine, Money, ProductId, ShippingMethod, Variant};
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::{BackendConfig, StorefrontConfig};
    use crate::services::session_data::save_cart;

    fn state() -> AppState {
        let backend = BackendConfig::new("http://127.0.0.1:9").unwrap();
        AppState::new(StorefrontConfig::new(backend)).unwrap()
    }

    fn checkout_with_saved_details() -> CheckoutState {
        let mut checkout = CheckoutState::new();
        checkout
            .complete_customer(&CustomerForm {
                email: "sam@example.com".to_string(),
                first_name: "Sam".to_string(),
                last_name: "Rivera".to_string(),
                phone: None,
            })
            .unwrap();
        checkout
            .complete_shipping(
                &ShippingForm {
                    address_id: Some("addr_1".to_string()),
                    address: None,
                    method: Some(ShippingMethod::Standard),
                },
                &[AddressId::new("addr_1")],
            )
            .unwrap();
        checkout
            .complete_payment(
                &PaymentForm {
                    payment_method_id: Some("pm_1".to_string()),
                    use_wallet: false,
                },
                &[PaymentMethodId::new("pm_1")],
            )
            .unwrap();
        checkout
    }

    #[tokio::test]
    async fn test_guest_cannot_submit_saved_details() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let mut cart = Cart::new();
        cart.add(CartLine {
            product_id: ProductId::new("hoodie"),
            name: "Hoodie".to_string(),
            unit_price: Money::from_cents(4000),
            quantity: 1,
            variant: Variant::default(),
        })
        .unwrap();
        save_cart(&session, &cart).await.unwrap();
        save_checkout(&session, &checkout_with_saved_details())
            .await
            .unwrap();

        let result = submit_order(State(state()), session.clone(), OptionalCustomer(None)).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        // Nothing was cleared.
        assert!(!load_cart(&session).await.unwrap().is_empty());
        assert!(load_checkout(&session).await.unwrap().is_complete());
    }
}
