//! Match endpoints: per-referral management and the candidate inbox.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use refermesh_core::matches::CreateMatchParams;
use refermesh_types::MatchState;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dto::MatchResponse;
use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::state::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let matches = state.matches.list(request_id, user.user_id).await?;
    let items: Vec<MatchResponse> = matches.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "items": items })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMatchRequest {
    pub candidate_agent_id: Uuid,
    #[serde(default)]
    pub score: f32,
    pub state: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(request_id): Path<Uuid>,
    Json(req): Json<CreateMatchRequest>,
) -> ApiResult<(StatusCode, Json<MatchResponse>)> {
    let match_state = match req.state.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<MatchState>()
                .map_err(ApiError::bad_request)?,
        ),
        None => None,
    };

    let created = state
        .matches
        .create(CreateMatchParams {
            request_id,
            owner_user_id: user.user_id,
            candidate_user_id: req.candidate_agent_id,
            score: req.score,
            state: match_state,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[derive(Deserialize)]
pub struct UpdateMatchRequest {
    pub state: String,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((request_id, match_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMatchRequest>,
) -> ApiResult<Json<MatchResponse>> {
    user.require_referral_actor()?;

    let new_state = req
        .state
        .parse::<MatchState>()
        .map_err(ApiError::bad_request)?;
    if new_state == MatchState::Invited {
        return Err(ApiError::bad_request("state must be 'accepted' or 'declined'"));
    }

    let result = state
        .matches
        .update_state(match_id, user.user_id, new_state)
        .await?;

    // The route is nested under a referral; a mismatched pair is treated
    // as absent rather than disclosing the match's true parent.
    if result.match_row.request_id != request_id {
        return Err(ApiError::not_found("Match not found"));
    }

    let mut resp = MatchResponse::from(result.match_row);
    resp.agreement = result.agreement.map(Into::into);
    Ok(Json(resp))
}

/// The candidate's inbox across all referrals.
pub async fn inbox(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    user.require_referral_actor()?;

    let matches = state.matches.list_for_candidate(user.user_id).await?;
    let items: Vec<MatchResponse> = matches.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "items": items })))
}
