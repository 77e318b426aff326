//! Caller identity supplied by the upstream gateway.
//!
//! Authentication happens before requests reach this service. The gateway
//! forwards the authenticated user in `x-user-id` and their role in
//! `x-user-role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::RequestContext;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor yielding the caller's [`RequestContext`].
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub RequestContext);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER} header")))?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));

        Ok(Identity(RequestContext {
            user_id: UserId::new(user_id),
            is_admin,
        }))
    }
}
