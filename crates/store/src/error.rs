use common::ProductId;
use thiserror::Error;

/// Postgres SQLSTATE codes the store gives meaning to.
mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const QUERY_CANCELED: &str = "57014";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
}

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The transaction lost a race against a concurrent writer and was rolled
    /// back. Nothing was applied; the caller may retry.
    #[error("Transaction conflict: {reason}")]
    Conflict { reason: String },

    /// The transaction did not finish in time and was rolled back.
    #[error("Transaction timed out")]
    Timeout,

    /// The store refused to commit. Nothing was applied.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint was violated.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A product cannot be deleted while order lines reference it.
    #[error("Product {0} is referenced by existing orders")]
    ProductReferenced(ProductId),

    /// A counter or sum would leave the range its column can hold. Nothing
    /// was written.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// A persisted value could not be mapped onto its Rust type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the failed operation left no trace and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Timeout | StoreError::Unavailable(_)
        )
    }

    /// Returns true if this is a foreign-key violation from the database.
    pub(crate) fn is_foreign_key_violation(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some(sqlstate::FOREIGN_KEY_VIOLATION)
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let classified = match &err {
            sqlx::Error::PoolTimedOut => Some(StoreError::Timeout),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(sqlstate::SERIALIZATION_FAILURE | sqlstate::DEADLOCK_DETECTED) => {
                    Some(StoreError::Conflict {
                        reason: db_err.message().to_string(),
                    })
                }
                Some(sqlstate::QUERY_CANCELED | sqlstate::LOCK_NOT_AVAILABLE) => {
                    Some(StoreError::Timeout)
                }
                Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => {
                    Some(StoreError::OutOfRange(db_err.message().to_string()))
                }
                Some(sqlstate::UNIQUE_VIOLATION) => Some(StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }),
                _ => None,
            },
            _ => None,
        };
        classified.unwrap_or(StoreError::Database(err))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(
            StoreError::Conflict {
                reason: "could not serialize access".into()
            }
            .is_retryable()
        );
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(!StoreError::ProductReferenced(ProductId::new(1)).is_retryable());
        assert!(!StoreError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Timeout
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
