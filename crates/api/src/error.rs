//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError, OrderStoreError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::EmptyOrder
            | OrderError::InvalidQuantity { .. }
            | OrderError::NegativeUnitPrice { .. }
            | OrderError::TotalOverflow { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        },
        DomainError::Store(store_err) => match store_err {
            OrderStoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
            OrderStoreError::AlreadyExists(_) | OrderStoreError::IllegalTransition { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            OrderStoreError::Unavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        },
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<OrderStoreError> for ApiError {
    fn from(err: OrderStoreError) -> Self {
        ApiError::Domain(DomainError::Store(err))
    }
}

impl From<saga::SagaStoreError> for ApiError {
    fn from(err: saga::SagaStoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
