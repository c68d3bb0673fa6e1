//! Authentication route handlers.
//!
//! Credentials are checked by the backend. A successful login stores the
//! backend's access token in the session; a login that needs a second factor
//! stores the challenge id until the code is verified.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use neoshop_core::{Email, FieldErrors};

use crate::backend::{BackendError, LoginOutcome};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    OptionalCustomer, clear_current_customer, set_current_customer, set_two_factor_challenge,
    two_factor_challenge,
};
use crate::models::{AccessToken, CurrentCustomer, TwoFactorChallenge};
use crate::state::AppState;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default = "empty_secret", deserialize_with = "secret_string")]
    pub password: SecretString,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn secret_string<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Two-factor form data.
#[derive(Debug, Deserialize)]
pub struct TwoFactorForm {
    #[serde(default)]
    pub code: String,
}

/// Result of a login step.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LoginResponse {
    /// Signed in.
    Authenticated { email: Email },
    /// Send the code with `/auth/two-factor-verify`.
    TwoFactorRequired,
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoginResponse>> {
    let mut errors = FieldErrors::new();
    if form.password.expose_secret().is_empty() {
        errors.add("password", "Password is required");
    }
    let email = match Email::parse(&form.email) {
        Ok(email) => email,
        Err(e) => {
            errors.add("email", e.to_string());
            return Err(errors.into());
        }
    };
    if !errors.is_empty() {
        return Err(errors.into());
    }

    match state.backend().login(&email, &form.password).await {
        Ok(LoginOutcome::Authenticated(token)) => sign_in(&session, token, email).await,
        Ok(LoginOutcome::TwoFactorRequired { challenge_id }) => {
            set_two_factor_challenge(&session, &TwoFactorChallenge { challenge_id, email }).await?;
            tracing::info!("Login awaiting second factor");
            Ok(Json(LoginResponse::TwoFactorRequired))
        }
        Err(BackendError::Unauthorized) => {
            tracing::info!("Login rejected");
            Err(AppError::Unauthorized("Invalid email or password".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Verify the second factor of a pending login.
#[instrument(skip(state, session, form))]
pub async fn verify_two_factor(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<TwoFactorForm>,
) -> Result<Json<LoginResponse>> {
    let Some(challenge) = two_factor_challenge(&session).await? else {
        return Err(AppError::BadRequest(
            "No sign-in is waiting for a code".to_string(),
        ));
    };

    let code = form.code.trim();
    if code.is_empty() {
        let mut errors = FieldErrors::new();
        errors.add("code", "Enter the code we sent you");
        return Err(errors.into());
    }

    match state
        .backend()
        .verify_two_factor(&challenge.challenge_id, code)
        .await
    {
        Ok(token) => sign_in(&session, token, challenge.email).await,
        Err(BackendError::Unauthorized) => Err(AppError::Unauthorized(
            "That code is not valid".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn sign_in(
    session: &Session,
    token: AccessToken,
    email: Email,
) -> Result<Json<LoginResponse>> {
    let customer = CurrentCustomer { token, email };
    set_current_customer(session, &customer).await?;
    set_sentry_user(customer.email.as_str());
    tracing::info!("Customer signed in");
    Ok(Json(LoginResponse::Authenticated {
        email: customer.email,
    }))
}

/// Handle logout.
///
/// The backend token is revoked on a best-effort basis; the session forgets
/// the customer regardless. The cart is kept.
#[instrument(skip(state, session, customer))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalCustomer(customer): OptionalCustomer,
) -> Result<StatusCode> {
    if let Some(customer) = customer
        && let Err(e) = state.backend().logout(&customer.token).await
    {
        tracing::warn!(error = %e, "Backend logout failed");
    }

    clear_current_customer(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_debug_hides_password() {
        let form: LoginForm =
            serde_json::from_str(r#"{"email":"sam@example.com","password":"hunter2"}"#).unwrap();
        let debug_output = format!("{form:?}");
        assert!(debug_output.contains("sam@example.com"));
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_login_response_shape() {
        let json = serde_json::to_value(LoginResponse::TwoFactorRequired).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "twoFactorRequired" }));
    }
}
