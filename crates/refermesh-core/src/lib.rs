//! Refermesh Core - the transactional heart of the referral marketplace
//!
//! Every service here is a plain struct over a `PgPool` with explicit
//! dependencies. Mutating operations open exactly one transaction that
//! covers the state mutation, the timeline append, and the outbox enqueue;
//! the schema's triggers and constraints do the final enforcement.

pub mod agreement;
pub mod broker;
pub mod dispute;
pub mod matches;
pub mod outbox;
pub mod pii;
pub mod referral;

pub use agreement::AgreementService;
pub use broker::BrokerService;
pub use dispute::DisputeService;
pub use matches::MatchService;
pub use outbox::{EdgeOutcome, OutboxHandler, OutboxWorker};
pub use pii::PiiService;
pub use referral::ReferralService;

use refermesh_types::CoreError;

/// Maps a unique violation to the given conflict message, passing other
/// database errors through as infrastructure failures.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> CoreError {
    if CoreError::is_unique_violation(&err) {
        CoreError::Conflict(message.to_string())
    } else {
        CoreError::Infrastructure(err)
    }
}

/// Lifts ledger-layer errors into the core taxonomy.
pub(crate) fn map_db_error(e: refermesh_db::DbError) -> CoreError {
    match e {
        refermesh_db::DbError::Query(q) => CoreError::Infrastructure(q),
        refermesh_db::DbError::Duplicate(_) => CoreError::DuplicateIdempotencyKey,
        other => CoreError::Validation(other.to_string()),
    }
}
