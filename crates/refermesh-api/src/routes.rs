//! Route definitions.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::require_auth;
use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));

    let authed = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route(
            "/api/referrals",
            get(handlers::referral::list).post(handlers::referral::create),
        )
        .route("/api/referrals/{id}/cancel", post(handlers::referral::cancel))
        .route(
            "/api/referrals/{id}/matches",
            get(handlers::matches::list).post(handlers::matches::create),
        )
        .route(
            "/api/referrals/{id}/matches/{match_id}",
            patch(handlers::matches::update),
        )
        .route("/api/matches", get(handlers::matches::inbox))
        .route(
            "/api/agreements",
            get(handlers::agreement::list)
                .post(handlers::agreement::create)
                .patch(handlers::agreement::update_status),
        )
        .route("/api/events", get(handlers::events::list))
        .route("/api/brokers", get(handlers::broker::list))
        .route("/api/brokers/{id}", get(handlers::broker::get))
        .route(
            "/api/disputes",
            get(handlers::dispute::list).post(handlers::dispute::create),
        )
        .route("/api/disputes/{id}", patch(handlers::dispute::resolve))
        .route_layer(axum_mw::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(authed)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
