//! Refermesh HTTP surface
//!
//! Thin axum layer over the core services: route wiring, JSON shaping,
//! bearer-token auth, and the error-kind to status-code mapping. All
//! business rules live in `refermesh-core` and the database schema.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
