//! HTTP facing error type

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use crate::domain::aggregates::{CartError, CouponError, HamperError, OrderError, ProductError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Admin access required")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{0} is not configured")]
    Unavailable(&'static str),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(errors) => errors
                .field_errors()
                .iter()
                .flat_map(|(field, errs)| errs.iter().map(move |e| match &e.message {
                    Some(m) => m.to_string(),
                    None => format!("{field} is invalid"),
                }))
                .next()
                .unwrap_or_else(|| "Invalid request".to_string()),
            ApiError::Database(_) | ApiError::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(serde_json::json!({ "success": false, "message": self.public_message() }))).into_response()
    }
}

impl From<ProductError> for ApiError {
    fn from(e: ProductError) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl From<CartError> for ApiError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound => ApiError::NotFound("Cart item"),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<HamperError> for ApiError {
    fn from(e: HamperError) -> Self {
        match e {
            HamperError::ItemNotFound => ApiError::NotFound("Hamper item"),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<CouponError> for ApiError {
    fn from(e: CouponError) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { .. } | OrderError::AlreadyPaid | OrderError::CannotCancel => ApiError::Conflict(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Maps unique-key violations to 409 so callers can report duplicates.
pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict(message.to_string()),
        _ => ApiError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(CartError::ItemNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(OrderError::CannotCancel).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(CouponError::Expired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unavailable("Razorpay").to_string(), "Razorpay is not configured");
    }

    #[test]
    fn test_internal_details_hidden() {
        let e = ApiError::Internal(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(e.public_message(), "Something went wrong");
    }
}
