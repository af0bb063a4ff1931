//! Referral endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use refermesh_core::referral::{CancelReferralParams, CreateReferralParams, ReferralFilters};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{Paginated, ReferralResponse};
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferralRequest {
    pub region: Vec<String>,
    pub price_min: i64,
    pub price_max: i64,
    #[serde(default)]
    pub property_type: String,
    #[serde(default)]
    pub deal_type: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub sla_hours: i32,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateReferralRequest>,
) -> ApiResult<(StatusCode, Json<ReferralResponse>)> {
    user.require_referral_actor()?;

    let created = state
        .referrals
        .create(CreateReferralParams {
            creator_user_id: user.user_id,
            region: req.region,
            price_min: req.price_min,
            price_max: req.price_max,
            property_type: req.property_type,
            deal_type: req.deal_type,
            languages: req.languages,
            sla_hours: req.sla_hours,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub region: Option<String>,
    pub deal_type: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_key: Option<String>,
    pub sort_order: Option<String>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Paginated<ReferralResponse>>> {
    let page = q.page.filter(|p| *p > 0).unwrap_or(1);
    let page_size = q.page_size.filter(|s| *s > 0 && *s <= 100).unwrap_or(20);

    let status = match q.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse()
                .map_err(|e: String| crate::error::ApiError::bad_request(e))?,
        ),
        None => None,
    };

    let result = state
        .referrals
        .list(ReferralFilters {
            creator_user_id: Some(user.user_id),
            status,
            region: q.region.filter(|r| !r.is_empty()),
            deal_type: q.deal_type.filter(|d| !d.is_empty()),
            page,
            page_size,
            sort_key: q.sort_key,
            sort_order: q.sort_order,
        })
        .await?;

    Ok(Json(Paginated {
        items: result.items.into_iter().map(Into::into).collect(),
        total: result.total,
        page,
        page_size,
    }))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    body: String,
) -> ApiResult<Json<ReferralResponse>> {
    // The body is optional; an empty one means "no reason given".
    let reason = if body.trim().is_empty() {
        None
    } else {
        serde_json::from_str::<CancelRequest>(&body)
            .map_err(|_| crate::error::ApiError::bad_request("Invalid request body"))?
            .reason
    };

    let updated = state
        .referrals
        .cancel(CancelReferralParams {
            request_id,
            actor_id: user.user_id,
            actor_role: user.role,
            reason,
        })
        .await?;

    Ok(Json(updated.into()))
}
