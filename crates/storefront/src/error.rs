//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`. Every error renders as a JSON
//! body `{"error": "..."}`; server-side failures are captured to Sentry and
//! their details stay in the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use texos_core::webhook::WebhookError;
use texos_core::{ErrorKind, RepositoryError, ShopError};

use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart, order, payment or address engine failure.
    #[error(transparent)]
    Shop(#[from] ShopError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

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

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Shop(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => err.status(),
            Self::Webhook(WebhookError::Malformed(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Webhook(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::Shop(err) => match err.kind() {
                ErrorKind::Internal => "Internal server error".to_string(),
                ErrorKind::Upstream => "Payment service unavailable".to_string(),
                _ => err.to_string(),
            },
            Self::Auth(err) => err.public_message(),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Webhook(WebhookError::Malformed(_)) => "Malformed webhook body".to_string(),
            Self::Webhook(_) => "Invalid signature".to_string(),
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after login.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Order not found".to_string());
        assert_eq!(err.to_string(), "Not found: Order not found");
    }

    #[test]
    fn test_shop_error_status_codes() {
        assert_eq!(
            get_status(ShopError::Validation("Cart is empty".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ShopError::NotFound("Order not found".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get_status(ShopError::OutOfStock.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(
                ShopError::InsufficientStock {
                    available: 3,
                    in_cart: 0
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ShopError::Upstream("timeout".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(ShopError::Internal("missing status row".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_webhook_status_codes() {
        assert_eq!(
            get_status(WebhookError::InvalidSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(WebhookError::MissingSignature.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(WebhookError::Malformed("eof".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err: AppError =
            ShopError::Repository(RepositoryError::Configuration("no pending row".into())).into();
        assert_eq!(err.public_message(), "Internal server error");

        let err: AppError = ShopError::InsufficientStock {
            available: 3,
            in_cart: 0,
        }
        .into();
        assert_eq!(err.public_message(), "Only 3 items available in stock");
    }
}
