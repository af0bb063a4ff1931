//! HTTP surface tests that run without a database: routing, the auth
//! middleware, and input rejection all fail before a connection is ever
//! acquired, so a lazy pool is enough.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use refermesh_api::AppState;
use refermesh_db::{Database, DatabaseConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_router() -> Router {
    let config = DatabaseConfig::with_url("postgresql://localhost:1/refermesh_unreachable");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy(&config.postgres_url)
        .expect("lazy pool");
    let db = Arc::new(Database { pg: pool });
    let state = Arc::new(AppState::new(db, "test-secret-key-at-least-32-bytes!!"));
    refermesh_api::router(state)
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(json_body) => Body::from(serde_json::to_vec(&json_body).unwrap()),
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(json!(null));
    (status, json)
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let router = test_router();

    for uri in [
        "/api/me",
        "/api/referrals",
        "/api/matches",
        "/api/agreements",
        "/api/events",
        "/api/brokers",
        "/api/disputes",
    ] {
        let (status, body) = send(&router, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["message"].is_string(), "{uri} must return a message body");
    }
}

#[tokio::test]
async fn protected_routes_reject_garbage_token() {
    let router = test_router();
    let (status, _) = send(&router, "GET", "/api/referrals", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_from_another_secret_are_rejected() {
    let router = test_router();

    let foreign = refermesh_auth::JwtService::new("a-different-secret-entirely-here!!");
    let token = foreign
        .issue(uuid::Uuid::new_v4(), refermesh_types::UserRole::Agent)
        .unwrap();

    let (status, _) = send(&router, "GET", "/api/referrals", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let router = test_router();

    let request = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let router = test_router();
    let (status, _) = send(&router, "GET", "/api/nothing-here", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dispute_resolution_requires_the_resolved_status() {
    let router = test_router();

    // A valid token gets past auth; the handler then rejects the body
    // before any storage access.
    let jwt = refermesh_auth::JwtService::new("test-secret-key-at-least-32-bytes!!");
    let token = jwt
        .issue(uuid::Uuid::new_v4(), refermesh_types::UserRole::Agent)
        .unwrap();

    let (status, body) = send(
        &router,
        "PATCH",
        &format!("/api/disputes/{}", uuid::Uuid::new_v4()),
        Some(&token),
        Some(json!({ "status": "escalated" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "status must be 'resolved'");
}
