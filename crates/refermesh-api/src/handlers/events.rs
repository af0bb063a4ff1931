//! Timeline readout, newest first.

use std::sync::Arc;

use axum::{extract::State, Json};
use refermesh_db::ledger;

use crate::dto::{Paginated, TimelineEventResponse};
use crate::error::ApiResult;
use crate::extractors::{AuthUser, Pagination};
use crate::state::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    pagination: Pagination,
) -> ApiResult<Json<Paginated<TimelineEventResponse>>> {
    let (events, total) = ledger::list_timeline_events(
        &state.db.pg,
        pagination.page(),
        pagination.page_size(),
    )
    .await?;

    Ok(Json(Paginated {
        items: events.into_iter().map(Into::into).collect(),
        total,
        page: pagination.page(),
        page_size: pagination.page_size(),
    }))
}
