//! Optimistic cart synchronisation.
//!
//! The session cart is the source of truth for the shopper. After every
//! mutation the change is mirrored to the backend on a detached task:
//! upserts become `PUT /cart`, removals `DELETE /cart`. Failures are logged
//! and otherwise ignored. There is no ordering between tasks, no retry and no
//! reconciliation, so the backend copy may drift.

use tokio::task::JoinHandle;
use tracing::Instrument;

use neoshop_core::CartChange;

use crate::backend::{BackendClient, BackendError};
use crate::models::AccessToken;

/// Send one change to the backend and wait for the answer.
///
/// # Errors
///
/// Returns the backend error unchanged.
pub async fn sync_change(
    backend: &BackendClient,
    token: Option<&AccessToken>,
    change: &CartChange,
) -> Result<(), BackendError> {
    match change {
        CartChange::Upserted(line) => backend.put_cart_line(token, line).await,
        CartChange::Removed(key) => backend.delete_cart_line(token, key).await,
    }
}

/// Mirror a change in the background. The caller never sees the outcome.
///
/// The handle is returned for tests; request handlers drop it.
pub fn spawn_sync(
    backend: BackendClient,
    token: Option<AccessToken>,
    change: CartChange,
) -> JoinHandle<()> {
    let span = tracing::info_span!("cart_sync", line = %change_key(&change));
    tokio::spawn(
        async move {
            match sync_change(&backend, token.as_ref(), &change).await {
                Ok(()) => tracing::debug!("Cart change synced"),
                Err(e) => tracing::warn!(error = %e, "Cart sync failed; local cart kept"),
            }
        }
        .instrument(span),
    )
}

fn change_key(change: &CartChange) -> String {
    match change {
        CartChange::Upserted(line) => line.key().to_string(),
        CartChange::Removed(key) => key.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use neoshop_core::{LineKey, ProductId, Variant};

    use super::*;
    use crate::config::BackendConfig;

    #[tokio::test]
    async fn test_failed_sync_is_swallowed() {
        // Nothing listens on the discard port; the request fails fast.
        let config = BackendConfig::new("http://127.0.0.1:9").unwrap();
        let backend = BackendClient::new(&config).unwrap();
        let change = CartChange::Removed(LineKey::new(ProductId::new("p1"), Variant::default()));

        assert!(sync_change(&backend, None, &change).await.is_err());
        // The detached task completes without panicking.
        spawn_sync(backend, None, change).await.unwrap();
    }
}
