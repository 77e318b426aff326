//! Domain error types.

use common::{PaginationError, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Business rejections (everything but [`DomainError::Store`]) leave the
/// store untouched. Store failures are split by [`DomainError::is_retryable`].
#[derive(Debug, Error)]
pub enum DomainError {
    /// The entity does not exist or is not visible to the caller.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The request contradicts the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Not enough stock to cover the requested quantity.
    #[error(
        "Insufficient stock for {product_name}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
        requested: u32,
    },

    /// Order placement was attempted with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller lacks the admin role.
    #[error("Admin access required")]
    Forbidden,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the stable caller-facing code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::EmptyCart => "EMPTY_CART",
            DomainError::Validation(_) => "VALIDATION_FAILED",
            DomainError::Forbidden => "FORBIDDEN",
            DomainError::Store(err) if err.is_retryable() => "RETRYABLE_CONFLICT",
            DomainError::Store(StoreError::UniqueViolation { .. })
            | DomainError::Store(StoreError::ProductReferenced(_)) => "CONFLICT",
            DomainError::Store(_) => "INTERNAL",
        }
    }

    /// Returns true if the operation left no trace and may be retried as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Store(err) if err.is_retryable())
    }
}

impl From<PaginationError> for DomainError {
    fn from(err: PaginationError) -> Self {
        DomainError::Validation(err.to_string())
    }
}
