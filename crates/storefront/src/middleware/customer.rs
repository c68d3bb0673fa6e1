//! Customer authentication extractors.
//!
//! The backend access token lives in the session after a successful login.
//! Handlers that need it take [`RequireCustomer`]; handlers that merely pass
//! it along when present take [`OptionalCustomer`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use neoshop_core::CheckoutState;

use crate::models::{CurrentCustomer, TwoFactorChallenge, session_keys};

/// Extractor that requires a signed-in customer.
///
/// # Example
///
/// ```rust,ignore
/// async fn wallet(
///     State(state): State<AppState>,
///     RequireCustomer(customer): RequireCustomer,
/// ) -> Result<Json<Wallet>> {
///     Ok(Json(state.backend().wallet(&customer.token).await?))
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

/// Rejection when no customer is signed in.
#[derive(Debug)]
pub struct CustomerRejection;

impl IntoResponse for CustomerRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Please sign in to continue" })),
        )
            .into_response()
    }
}

async fn current_customer(parts: &Parts) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = CustomerRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_customer(parts).await.map(Self).ok_or(CustomerRejection)
    }
}

/// Extractor that optionally gets the signed-in customer.
///
/// Never rejects; guests get `None`.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_customer(parts).await))
    }
}

/// Store the signed-in customer and drop any pending two-factor challenge.
///
/// The session id is cycled to prevent fixation. Checkout progress starts
/// over; the cart is kept.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<TwoFactorChallenge>(session_keys::TWO_FACTOR_CHALLENGE)
        .await?;
    session
        .remove::<CheckoutState>(session_keys::CHECKOUT)
        .await?;
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Forget the signed-in customer and their checkout progress.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    session
        .remove::<CheckoutState>(session_keys::CHECKOUT)
        .await?;
    Ok(())
}

/// Remember a login that is waiting for its second factor.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_two_factor_challenge(
    session: &Session,
    challenge: &TwoFactorChallenge,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::TWO_FACTOR_CHALLENGE, challenge)
        .await
}

/// The pending two-factor challenge, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn two_factor_challenge(
    session: &Session,
) -> Result<Option<TwoFactorChallenge>, tower_sessions::session::Error> {
    session.get(session_keys::TWO_FACTOR_CHALLENGE).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use neoshop_core::Email;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::models::AccessToken;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn parts_with(session: Option<Session>) -> Parts {
        let (mut parts, ()) = Request::new(()).into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    fn customer() -> CurrentCustomer {
        CurrentCustomer {
            token: AccessToken::new("tok"),
            email: Email::parse("sam@example.com").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_require_customer_rejects_guests() {
        let mut parts = parts_with(Some(session()));
        assert!(RequireCustomer::from_request_parts(&mut parts, &()).await.is_err());

        let mut parts = parts_with(None);
        assert!(RequireCustomer::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let session = session();
        set_two_factor_challenge(
            &session,
            &TwoFactorChallenge {
                challenge_id: "ch_1".to_string(),
                email: customer().email,
            },
        )
        .await
        .unwrap();
        set_current_customer(&session, &customer()).await.unwrap();
        assert!(two_factor_challenge(&session).await.unwrap().is_none());

        let mut parts = parts_with(Some(session.clone()));
        let RequireCustomer(found) = RequireCustomer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.token, AccessToken::new("tok"));

        session
            .insert(session_keys::CHECKOUT, CheckoutState::new())
            .await
            .unwrap();
        clear_current_customer(&session).await.unwrap();
        assert!(
            session
                .get::<CheckoutState>(session_keys::CHECKOUT)
                .await
                .unwrap()
                .is_none()
        );
        let mut parts = parts_with(Some(session));
        let OptionalCustomer(found) = OptionalCustomer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
