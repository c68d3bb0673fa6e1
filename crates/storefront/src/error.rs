//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error responses are JSON:
//!
//! ```json
//! { "error": "Please correct the highlighted fields", "fields": { "email": "Email is required" } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use neoshop_core::{CartError, CheckoutError, FieldErrors};

use crate::backend::BackendError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Form fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Cart operation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order cannot be placed yet.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Backend(err) => match err {
                BackendError::Unauthorized => StatusCode::UNAUTHORIZED,
                BackendError::NotFound(_) => StatusCode::NOT_FOUND,
                BackendError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cart(CartError::LineNotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::Checkout(CheckoutError::EmptyCart) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Checkout(CheckoutError::Incomplete(_)) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Whether this error is our (or the backend's) fault and worth reporting.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Session(_) | Self::Internal(_) | Self::Backend(
                BackendError::Http(_)
                    | BackendError::Api { .. }
                    | BackendError::Parse(_)
                    | BackendError::Unexpected(_)
                    | BackendError::Url(_)
            )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let body = match self {
            Self::Session(_) | Self::Internal(_) => ErrorBody {
                error: "Internal server error".to_string(),
                fields: None,
            },
            Self::Backend(err) => ErrorBody {
                error: match err {
                    BackendError::Unauthorized => "Please sign in again".to_string(),
                    BackendError::NotFound(_) => "Not found".to_string(),
                    BackendError::RateLimited(_) => {
                        "Too many requests, please try again shortly".to_string()
                    }
                    _ => "Something went wrong, please try again".to_string(),
                },
                fields: None,
            },
            Self::Validation(fields) => ErrorBody {
                error: "Please correct the highlighted fields".to_string(),
                fields: Some(fields),
            },
            Self::Cart(err) => ErrorBody {
                error: err.to_string(),
                fields: None,
            },
            Self::Checkout(err) => ErrorBody {
                error: err.to_string(),
                fields: None,
            },
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => ErrorBody {
                error: msg,
                fields: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(email: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            email: Some(email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use neoshop_core::CheckoutStep;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order ord_1".to_string());
        assert_eq!(err.to_string(), "Not found: order ord_1");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("test".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Backend(BackendError::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Backend(BackendError::NotFound("orders/1".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Backend(BackendError::Api {
                status: 500,
                message: "boom".to_string()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Cart(CartError::InvalidQuantity(0)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::Incomplete(CheckoutStep::Payment)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::EmptyCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("test".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.add("email", "Email is required");

        let (status, body) = body_json(AppError::Validation(fields)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"]["email"], "Email is required");
    }

    #[tokio::test]
    async fn test_backend_details_are_hidden() {
        let err = AppError::Backend(BackendError::Api {
            status: 500,
            message: "stack trace at db.rs:42".to_string(),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body["error"].as_str().unwrap().contains("db.rs"));
        assert!(body.get("fields").is_none());
    }
}
