//! Registration, login, and the current-user endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use refermesh_auth::RegisterParams;
use refermesh_types::UserRole;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dto::UserResponse;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub broker_id: Option<Uuid>,
    #[serde(default)]
    pub languages: Vec<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = state
        .auth
        .register(RegisterParams {
            email: req.email,
            password: req.password,
            full_name: req.full_name,
            phone: req.phone,
            role: req.role,
            broker_id: req.broker_id,
            languages: req.languages,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": UserResponse::from(user) })),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let resp = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(json!({
        "token": resp.token,
        "user": UserResponse::from(resp.user),
    })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let profile = state.auth.get_user(user.user_id).await?;
    Ok(Json(profile.into()))
}
