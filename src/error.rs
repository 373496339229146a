use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages.
///
/// Centralized so handlers and tests agree on the exact wording, and so
/// nothing provider-specific leaks into a client response by accident.
pub mod msg {
    pub const CART_EMPTY: &str = "Cart is empty or invalid";
    pub const PRODUCT_NOT_FOUND: &str = "Product not found";
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const RECAPTCHA_TOKEN_MISSING: &str = "Missing reCAPTCHA token";
    pub const RECAPTCHA_FAILED: &str = "reCAPTCHA check failed";
    pub const SESSION_REQUIRED: &str = "User must be logged in with a valid session";
    pub const EMAIL_OR_INVOICE_MISSING: &str = "Missing required email or invoice id";
    pub const CHECKOUT_FAILED: &str = "Unable to create checkout session";
    pub const CONFIRM_FAILED: &str = "Unable to confirm purchase";
    pub const RECEIPT_FAILED: &str = "Failed to send order confirmation";
    pub const RECEIPT_LINK_INVALID: &str = "Receipt link is invalid or has expired";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation errors carry a specific kind and message to the client.
    /// Everything else is surfaced as an opaque internal failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::Unauthenticated
                | AppError::InvalidArgument(_)
                | AppError::NotFound(_)
                | AppError::PermissionDenied(_)
        )
    }
}

/// Shorthand for `Option -> AppError` conversions in handlers.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated", None),
            AppError::InvalidArgument(m) => {
                (StatusCode::BAD_REQUEST, "Invalid argument", Some(m.clone()))
            }
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "Not found", Some(m.clone())),
            AppError::PermissionDenied(m) => {
                (StatusCode::FORBIDDEN, "Permission denied", Some(m.clone()))
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(m) => {
                tracing::error!("Internal error: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
