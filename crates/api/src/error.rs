//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the response is built; clients only ever see a
//! JSON body of the form `{"error": "<message>"}` without internal details.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use andes_core::catalog::CatalogError;
use andes_core::checkout::CheckoutError;
use andes_core::pricing::PricingError;
use andes_core::shipping::ShippingError;
use andes_core::stock::StockError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutServiceError;
use crate::services::orders::OrderServiceError;
use crate::services::payments::PaymentError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout transaction failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutServiceError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderServiceError),

    /// Payment operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Shipping evaluation failed.
    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Catalog rule violated.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Invalid pricing.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// Stock operation rejected.
    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Payment gateway credentials are not configured.
    #[error("Payments are not configured")]
    PaymentsDisabled,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidRut(_)
                | AuthError::InvalidName => StatusCode::BAD_REQUEST,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutServiceError::Checkout(CheckoutError::EmptyCart)
                | CheckoutServiceError::Checkout(CheckoutError::InvalidQuantity { .. })
                | CheckoutServiceError::InvalidCustomer(_) => StatusCode::BAD_REQUEST,
                CheckoutServiceError::Checkout(_) | CheckoutServiceError::Stock(_) => {
                    StatusCode::CONFLICT
                }
                CheckoutServiceError::Shipping(err) => shipping_status(err),
                CheckoutServiceError::AddressNotFound => StatusCode::NOT_FOUND,
                CheckoutServiceError::Repository(err) => repository_status(err),
            },
            Self::Order(err) => order_status(err),
            Self::Payment(err) => match err {
                PaymentError::Gateway(_) | PaymentError::AmountMismatch { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                PaymentError::NotPayable(_) => StatusCode::CONFLICT,
                PaymentError::UnknownToken | PaymentError::OrderNotFound => StatusCode::NOT_FOUND,
                PaymentError::Order(err) => order_status(err),
                PaymentError::Repository(err) => repository_status(err),
            },
            Self::Shipping(err) => shipping_status(err),
            Self::Catalog(_) | Self::Pricing(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Stock(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    fn public_message(&self, status: StatusCode) -> String {
        match status {
            StatusCode::BAD_GATEWAY => return "Payment gateway error".to_string(),
            StatusCode::SERVICE_UNAVAILABLE => return "Payments are not configured".to_string(),
            s if s.is_server_error() => return "Internal server error".to_string(),
            _ => {}
        }

        match self {
            Self::Database(err) => err.to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                other => other.to_string(),
            },
            Self::Checkout(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Payment(err) => err.to_string(),
            Self::Shipping(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::Pricing(err) => err.to_string(),
            Self::Stock(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Invalid(_) => StatusCode::BAD_REQUEST,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn shipping_status(err: &ShippingError) -> StatusCode {
    match err {
        ShippingError::NoZoneForRegion(_) | ShippingError::NoMatchingRule => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ShippingError::NegativeWeight | ShippingError::InvalidRule(_) => StatusCode::BAD_REQUEST,
    }
}

fn order_status(err: &OrderServiceError) -> StatusCode {
    match err {
        OrderServiceError::NotFound => StatusCode::NOT_FOUND,
        OrderServiceError::InvalidTransition { .. } | OrderServiceError::Stock(_) => {
            StatusCode::CONFLICT
        }
        OrderServiceError::Repository(err) => repository_status(err),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && !matches!(self, Self::PaymentsDisabled) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message(status);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
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

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {err}"))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
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
    use andes_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product".to_string());
        assert_eq!(err.to_string(), "Not found: product");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::PaymentsDisabled),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_codes() {
        assert_eq!(
            get_status(RepositoryError::Conflict("sku".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Invalid("price".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_domain_errors() {
        assert_eq!(
            get_status(ShippingError::NoMatchingRule.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(
                CheckoutServiceError::Checkout(CheckoutError::InsufficientStock {
                    product_id: ProductId::new(1),
                    requested: 3,
                    available: 1,
                })
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutServiceError::Checkout(CheckoutError::EmptyCart).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                OrderServiceError::InvalidTransition {
                    from: OrderStatus::Shipped,
                    to: OrderStatus::Paid,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CatalogError::Cycle.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let body = body_json(AppError::BadRequest("quantity must be positive".to_string())).await;
        assert_eq!(body["error"], "quantity must be positive");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_json(AppError::Internal("pool exhausted at 10.0.0.3".to_string())).await;
        assert_eq!(body["error"], "Internal server error");

        let body = body_json(RepositoryError::DataCorruption("bad rut".to_string()).into()).await;
        assert_eq!(body["error"], "Internal server error");
    }
}
