//! Account route handlers (requires auth).
//!
//! Profile, saved addresses, saved payment methods and the wallet. Loads
//! that fail answer `200` with a generic inline message; mutations that fail
//! answer with the mapped error status.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use neoshop_core::{
    AddressId, AddressInput, CustomerForm, FieldErrors, Money, OrderId, PaymentMethodId,
};

use crate::backend::{
    Address, NewPaymentMethod, PaymentMethod, PaymentMethodUpdate, UserDetails, Wallet, WalletUse,
};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::routes::Loaded;
use crate::state::AppState;

// =============================================================================
// Profile
// =============================================================================

/// Show the profile.
#[instrument(skip(state, customer))]
pub async fn details(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Loaded<UserDetails>>> {
    Ok(Json(Loaded::from_result(
        state.backend().user_details(&customer.token).await,
        "We couldn't load your details. Please try again.",
    )?))
}

/// Replace the profile. Validated like the checkout contact form.
#[instrument(skip(state, customer, form))]
pub async fn update_details(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(form): Json<CustomerForm>,
) -> Result<Json<UserDetails>> {
    let details = UserDetails::from(form.validate()?);
    let updated = state
        .backend()
        .update_user_details(&customer.token, &details)
        .await?;
    Ok(Json(updated))
}

// =============================================================================
// Addresses
// =============================================================================

/// List saved addresses.
#[instrument(skip(state, customer))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Loaded<Vec<Address>>>> {
    Ok(Json(Loaded::from_result(
        state.backend().addresses(&customer.token).await,
        "We couldn't load your addresses. Please try again.",
    )?))
}

/// Save a new address.
#[instrument(skip(state, customer, input))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = input.validate("")?;
    let created = state
        .backend()
        .create_address(&customer.token, &address)
        .await?;
    add_breadcrumb("account", "Added address", None);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a saved address.
#[instrument(skip(state, customer, input))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    let address = input.validate("")?;
    let updated = state
        .backend()
        .update_address(&customer.token, &id, &address)
        .await?;
    Ok(Json(updated))
}

/// Make a saved address the default.
#[instrument(skip(state, customer))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let updated = state
        .backend()
        .set_default_address(&customer.token, &id)
        .await?;
    Ok(Json(updated))
}

/// Delete a saved address.
#[instrument(skip(state, customer))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    state.backend().delete_address(&customer.token, &id).await?;
    add_breadcrumb(
        "account",
        "Deleted address",
        Some(&[("address_id", id.as_str())]),
    );
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Payment methods
// =============================================================================

/// Body for saving a payment method.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentMethodForm {
    #[serde(default)]
    pub provider_token: String,
    #[serde(default)]
    pub holder_name: String,
}

impl NewPaymentMethodForm {
    fn validate(&self) -> std::result::Result<NewPaymentMethod, FieldErrors> {
        let mut errors = FieldErrors::new();
        let provider_token = self.provider_token.trim();
        let holder_name = self.holder_name.trim();
        if provider_token.is_empty() {
            errors.add("providerToken", "Card details are required");
        }
        if holder_name.is_empty() {
            errors.add("holderName", "Name on card is required");
        }
        errors.into_result(NewPaymentMethod {
            provider_token: provider_token.to_owned(),
            holder_name: holder_name.to_owned(),
        })
    }
}

/// Body for editing a payment method.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodUpdateForm {
    #[serde(default)]
    pub holder_name: String,
    #[serde(default)]
    pub expiry_month: u8,
    #[serde(default)]
    pub expiry_year: u16,
}

impl PaymentMethodUpdateForm {
    fn validate(&self) -> std::result::Result<PaymentMethodUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let holder_name = self.holder_name.trim();
        if holder_name.is_empty() {
            errors.add("holderName", "Name on card is required");
        }
        if !(1..=12).contains(&self.expiry_month) {
            errors.add("expiryMonth", "Enter a month between 1 and 12");
        }
        if !(2000..=2100).contains(&self.expiry_year) {
            errors.add("expiryYear", "Enter a valid year");
        }
        errors.into_result(PaymentMethodUpdate {
            holder_name: holder_name.to_owned(),
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
        })
    }
}

/// List saved payment methods.
#[instrument(skip(state, customer))]
pub async fn payment_methods(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Loaded<Vec<PaymentMethod>>>> {
    Ok(Json(Loaded::from_result(
        state.backend().payment_methods(&customer.token).await,
        "We couldn't load your payment methods. Please try again.",
    )?))
}

/// Save a payment method.
#[instrument(skip(state, customer, form))]
pub async fn create_payment_method(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(form): Json<NewPaymentMethodForm>,
) -> Result<(StatusCode, Json<PaymentMethod>)> {
    let method = form.validate()?;
    let created = state
        .backend()
        .create_payment_method(&customer.token, &method)
        .await?;
    add_breadcrumb("account", "Added payment method", None);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edit a saved payment method.
#[instrument(skip(state, customer, form))]
pub async fn update_payment_method(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<PaymentMethodId>,
    Json(form): Json<PaymentMethodUpdateForm>,
) -> Result<Json<PaymentMethod>> {
    let update = form.validate()?;
    let updated = state
        .backend()
        .update_payment_method(&customer.token, &id, &update)
        .await?;
    Ok(Json(updated))
}

/// Make a saved payment method the default.
#[instrument(skip(state, customer))]
pub async fn set_default_payment_method(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<PaymentMethodId>,
) -> Result<Json<PaymentMethod>> {
    let updated = state
        .backend()
        .set_default_payment_method(&customer.token, &id)
        .await?;
    Ok(Json(updated))
}

/// Delete a saved payment method.
#[instrument(skip(state, customer))]
pub async fn delete_payment_method(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<PaymentMethodId>,
) -> Result<StatusCode> {
    state
        .backend()
        .delete_payment_method(&customer.token, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Wallet
// =============================================================================

/// Body for spending wallet balance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletUseForm {
    pub amount: Money,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// Show wallet balance and history.
#[instrument(skip(state, customer))]
pub async fn wallet(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Loaded<Wallet>>> {
    Ok(Json(Loaded::from_result(
        state.backend().wallet(&customer.token).await,
        "We couldn't load your wallet. Please try again.",
    )?))
}

/// Spend wallet balance.
#[instrument(skip(state, customer, form))]
pub async fn use_wallet(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(form): Json<WalletUseForm>,
) -> Result<Json<Wallet>> {
    if form.amount.is_zero() {
        let mut errors = FieldErrors::new();
        errors.add("amount", "Enter an amount greater than zero");
        return Err(errors.into());
    }

    let spend = WalletUse {
        amount: form.amount,
        order_id: form.order_id,
    };
    let wallet = state.backend().use_wallet(&customer.token, &spend).await?;
    Ok(Json(wallet))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_payment_method_requires_fields() {
        let errors = NewPaymentMethodForm::default().validate().unwrap_err();
        assert!(errors.get("providerToken").is_some());
        assert!(errors.get("holderName").is_some());

        let form = NewPaymentMethodForm {
            provider_token: " tok_visa ".to_string(),
            holder_name: "Sam Rivera".to_string(),
        };
        assert_eq!(form.validate().unwrap().provider_token, "tok_visa");
    }

    #[test]
    fn test_payment_method_update_checks_expiry() {
        let form = PaymentMethodUpdateForm {
            holder_name: "Sam".to_string(),
            expiry_month: 13,
            expiry_year: 2030,
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("expiryMonth"), Some("Enter a month between 1 and 12"));
        assert!(errors.get("expiryYear").is_none());
    }
}
