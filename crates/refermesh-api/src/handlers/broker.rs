//! Broker lookup endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::dto::BrokerResponse;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BrokerListQuery {
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(q): Query<BrokerListQuery>,
) -> ApiResult<Json<Value>> {
    let brokers = state.brokers.list(q.limit.unwrap_or(50)).await?;
    let items: Vec<BrokerResponse> = brokers.into_iter().map(Into::into).collect();
    let total = items.len();
    Ok(Json(json!({ "items": items, "total": total })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BrokerResponse>> {
    let broker = state.brokers.get(id).await?;
    Ok(Json(broker.into()))
}
