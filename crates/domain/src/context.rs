//! Caller identity passed into every operation.

use common::UserId;

use crate::error::DomainError;

/// Authenticated caller, as established by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl RequestContext {
    /// A regular customer.
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    /// An administrator.
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Fails with [`DomainError::Forbidden`] unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(DomainError::Forbidden)
        }
    }
}
