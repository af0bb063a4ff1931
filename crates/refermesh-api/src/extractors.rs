//! Request extractors: the authenticated user injected by the auth
//! middleware, and pagination query parameters.

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use refermesh_types::UserRole;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Authenticated user extracted from request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    /// Role gate shared by the referral/match endpoints.
    pub fn require_referral_actor(&self) -> Result<(), ApiError> {
        if self.role.can_act_on_referrals() {
            Ok(())
        } else {
            Err(ApiError::new(
                axum::http::StatusCode::FORBIDDEN,
                "Insufficient permissions",
            ))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Pagination query parameters, defaulted and clamped like every list
/// endpoint: page >= 1, pageSize in 1..=100 (default 20).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.filter(|s| *s > 0 && *s <= 100).unwrap_or(20)
    }
}

impl<S> FromRequestParts<S> for Pagination
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(p) = Query::<Pagination>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination { page: None, page_size: None };
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 20);

        let p = Pagination { page: Some(-3), page_size: Some(500) };
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), 20);

        let p = Pagination { page: Some(4), page_size: Some(50) };
        assert_eq!(p.page(), 4);
        assert_eq!(p.page_size(), 50);
    }
}
