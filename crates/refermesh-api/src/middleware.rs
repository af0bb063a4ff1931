//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// Verifies the `Authorization: Bearer` token and injects `AuthUser` into
/// request extensions for the extractors downstream.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::unauthorized)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::unauthorized)?;

    let (user_id, role) = state
        .auth
        .verify_token(token)
        .map_err(|_| ApiError::unauthorized())?;

    req.extensions_mut().insert(AuthUser { user_id, role });
    Ok(next.run(req).await)
}
