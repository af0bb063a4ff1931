//! Agreement endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use refermesh_core::agreement::{CreateAgreementParams, TransitionParams};
use refermesh_types::AgreementStatus;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::dto::{AgreementResponse, Paginated};
use crate::error::{ApiError, ApiResult};
use crate::extractors::{AuthUser, Pagination};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgreementRequest {
    pub request_id: Uuid,
    pub referrer_broker_id: Uuid,
    pub referee_broker_id: Uuid,
    #[serde(default)]
    pub fee_rate: Decimal,
    #[serde(default)]
    pub protect_days: i32,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateAgreementRequest>,
) -> ApiResult<(StatusCode, Json<AgreementResponse>)> {
    let created = state
        .agreements
        .create(
            user.user_id,
            CreateAgreementParams {
                request_id: req.request_id,
                referrer_broker_id: req.referrer_broker_id,
                referee_broker_id: req.referee_broker_id,
                fee_rate: req.fee_rate,
                protect_days: req.protect_days,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    pagination: Pagination,
) -> ApiResult<Json<Paginated<AgreementResponse>>> {
    let (items, total) = state
        .agreements
        .list(user.user_id, pagination.page(), pagination.page_size())
        .await?;

    Ok(Json(Paginated {
        items: items.into_iter().map(Into::into).collect(),
        total,
        page: pagination.page(),
        page_size: pagination.page_size(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub agreement_id: Uuid,
    pub next_status: String,
    pub payload: Option<Map<String, Value>>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Value>> {
    let next_status = req
        .next_status
        .parse::<AgreementStatus>()
        .map_err(ApiError::bad_request)?;

    state
        .agreements
        .transition(TransitionParams {
            agreement_id: req.agreement_id,
            actor_id: user.user_id,
            next_status,
            payload: req.payload,
        })
        .await?;

    Ok(Json(json!({
        "agreementId": req.agreement_id,
        "nextStatus": req.next_status,
    })))
}
