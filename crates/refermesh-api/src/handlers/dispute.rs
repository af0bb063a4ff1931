//! Dispute endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dto::DisputeResponse;
use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeListQuery {
    pub agreement_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(q): Query<DisputeListQuery>,
) -> ApiResult<Json<Value>> {
    let records = state.disputes.list(user.user_id, q.agreement_id).await?;
    let items: Vec<DisputeResponse> = records.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisputeRequest {
    pub agreement_id: Uuid,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateDisputeRequest>,
) -> ApiResult<(StatusCode, Json<DisputeResponse>)> {
    let record = state.disputes.create(user.user_id, req.agreement_id).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[derive(Deserialize)]
pub struct ResolveDisputeRequest {
    pub status: String,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(dispute_id): Path<Uuid>,
    Json(req): Json<ResolveDisputeRequest>,
) -> ApiResult<Json<DisputeResponse>> {
    if req.status != "resolved" {
        return Err(ApiError::bad_request("status must be 'resolved'"));
    }

    let record = state.disputes.resolve(user.user_id, dispute_id).await?;
    Ok(Json(record.into()))
}
