//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use cartline_core::UserIdentity;

use crate::cart::CartError;
use crate::db::RepositoryError;

/// Application-level error type for the cart service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart engine rejected or failed the operation.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Database operation failed outside the engine.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource".to_owned()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::Invalid(msg) => Self::BadRequest(msg),
            other => Self::Database(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(CartError::InvalidRequest(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Cart(CartError::NotFound(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Cart(CartError::Store(_)) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show the client.
    fn client_message(&self) -> String {
        match self {
            // Don't expose store details to clients
            Self::Cart(CartError::Store(_)) | Self::Database(_) | Self::Internal(_) => {
                "Internal server error".to_owned()
            }
            Self::Cart(CartError::InvalidRequest(msg))
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Cart(CartError::NotFound(what)) | Self::NotFound(what) => {
                format!("{what} not found")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
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

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from the cart owner.
///
/// The identity doubles as the email when it has that shape.
pub fn set_sentry_user(user: &UserIdentity) {
    let email = user.looks_like_email().then(|| user.as_str().to_owned());
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.as_str().to_owned()),
            email,
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_owned(),
            serde_json::Value::String((*value).to_owned()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_owned());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::from(CartError::missing("quantity"));
        assert_eq!(err.to_string(), "invalid request: quantity is required");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: impl Into<AppError>) -> StatusCode {
            err.into().into_response().status()
        }

        assert_eq!(
            get_status(CartError::InvalidRequest("x".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::NotFound("x".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::Store(RepositoryError::Unavailable("x".to_owned()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("x".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Invalid("x".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("x".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_store_details_are_hidden() {
        let err = AppError::from(CartError::Store(RepositoryError::DataCorruption(
            "row 7 has quantity -1".to_owned(),
        )));
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_errors_carry_message() {
        let (status, body) = body_of(CartError::missing("userIdentity").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "userIdentity is required");

        let (status, body) = body_of(CartError::NotFound("product p9".to_owned()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "product p9 not found");
    }
}
