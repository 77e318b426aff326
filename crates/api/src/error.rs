//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable caller identity.
    #[error("{0}")]
    Unauthorized(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            ApiError::Domain(err) => (domain_status(err), err.code()),
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::InsufficientStock { .. }
        | DomainError::EmptyCart
        | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::Store(store_err) if store_err.is_retryable() => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DomainError::Store(StoreError::UniqueViolation { .. } | StoreError::ProductReferenced(_)) => {
            StatusCode::CONFLICT
        }
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let retryable = matches!(&self, ApiError::Domain(err) if err.is_retryable());

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let body = serde_json::json!({
            "error": message,
            "code": code,
            "retryable": retryable,
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Domain(DomainError::EmptyCart),
                StatusCode::BAD_REQUEST,
                "EMPTY_CART",
            ),
            (
                ApiError::Domain(DomainError::InsufficientStock {
                    product_id: ProductId::new(1),
                    product_name: "Widget".into(),
                    available: 0,
                    requested: 1,
                }),
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_STOCK",
            ),
            (
                ApiError::Domain(DomainError::Conflict("status".into())),
                StatusCode::CONFLICT,
                "CONFLICT",
            ),
            (
                ApiError::Domain(DomainError::Forbidden),
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (
                ApiError::Domain(DomainError::Store(StoreError::Timeout)),
                StatusCode::SERVICE_UNAVAILABLE,
                "RETRYABLE_CONFLICT",
            ),
            (
                ApiError::Domain(DomainError::Store(StoreError::Decode("bad".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
            ),
            (
                ApiError::Unauthorized("missing".into()),
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }
}
