//! Typed access to the shopping state held in the session.
//!
//! A missing or unreadable entry is treated as empty: a fresh cart and a
//! checkout at the first step. Store failures are still errors.

use serde::de::DeserializeOwned;
use tower_sessions::Session;
use tower_sessions::session::Error;

use neoshop_core::{Cart, CheckoutState};

use crate::models::session_keys;

/// Read `key`, falling back to the default when it is absent or no longer
/// decodes.
async fn load_or_default<T>(session: &Session, key: &str) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    match session.get::<T>(key).await {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(Error::SerdeJson(e)) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session entry");
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// The session's cart, or an empty one.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart, Error> {
    load_or_default(session, session_keys::CART).await
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), Error> {
    session.insert(session_keys::CART, cart).await
}

/// The session's checkout progress, or a fresh checkout.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_checkout(session: &Session) -> Result<CheckoutState, Error> {
    load_or_default(session, session_keys::CHECKOUT).await
}

/// Store checkout progress in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_checkout(
    session: &Session,
    checkout: &CheckoutState,
) -> Result<(), Error> {
    session.insert(session_keys::CHECKOUT, checkout).await
}

/// Forget the cart and checkout after an order is placed.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_order_state(session: &Session) -> Result<(), Error> {
    session.remove::<Cart>(session_keys::CART).await?;
    session
        .remove::<CheckoutState>(session_keys::CHECKOUT)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use neoshop_core::{CartLine, CheckoutStep, Money, ProductId, Variant};
    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_empty_session_defaults() {
        let session = session();
        assert!(load_cart(&session).await.unwrap().is_empty());
        assert_eq!(
            load_checkout(&session).await.unwrap().step(),
            CheckoutStep::Customer
        );
    }

    #[tokio::test]
    async fn test_unreadable_entries_fall_back_to_empty() {
        let session = session();
        session.insert(session_keys::CART, "not a cart").await.unwrap();
        session.insert(session_keys::CHECKOUT, 42).await.unwrap();

        assert!(load_cart(&session).await.unwrap().is_empty());
        assert_eq!(
            load_checkout(&session).await.unwrap().step(),
            CheckoutStep::Customer
        );
    }

    #[tokio::test]
    async fn test_cart_round_trip_and_clear() {
        let session = session();
        let mut cart = Cart::new();
        cart.add(CartLine {
            product_id: ProductId::new("p1"),
            name: "Tee".to_string(),
            unit_price: Money::from_cents(1500),
            quantity: 2,
            variant: Variant::new(Some("black"), Some("M")),
        })
        .unwrap();
        save_cart(&session, &cart).await.unwrap();

        let mut checkout = CheckoutState::new();
        checkout.go_to_step(CheckoutStep::Payment);
        save_checkout(&session, &checkout).await.unwrap();

        assert_eq!(load_cart(&session).await.unwrap(), cart);
        assert_eq!(load_checkout(&session).await.unwrap(), checkout);

        clear_order_state(&session).await.unwrap();
        assert!(load_cart(&session).await.unwrap().is_empty());
        assert_eq!(
            load_checkout(&session).await.unwrap().step(),
            CheckoutStep::Customer
        );
    }
}
