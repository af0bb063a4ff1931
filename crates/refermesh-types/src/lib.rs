//! Refermesh Types - Canonical domain types for the referral marketplace
//!
//! This crate contains the shared vocabulary of the platform with zero
//! dependencies on other refermesh crates:
//!
//! - Lifecycle enums for referrals, matches, agreements and disputes,
//!   mirrored one-to-one onto the PostgreSQL enum types
//! - The agreement state machine (`AgreementStatus::can_transition_to`)
//! - Timeline event types and outbox topics
//! - The `CoreError` taxonomy shared by every service

pub mod error;
pub mod lifecycle;

pub use error::{CoreError, CoreResult};
pub use lifecycle::*;

/// Timeline event types appended to the per-agreement ledger.
pub mod event {
    pub const REFERRAL_CREATED: &str = "REFERRAL_CREATED";
    pub const AGREEMENT_CREATED: &str = "AGREEMENT_CREATED";
    pub const AGREEMENT_STATUS_CHANGED: &str = "AGREEMENT_STATUS_CHANGED";
    pub const ESIGN_COMPLETED: &str = "ESIGN_COMPLETED";
    pub const OFFER_MADE: &str = "OFFER_MADE";
    pub const DEAL_CLOSED: &str = "DEAL_CLOSED";

    /// Event types gated by the temporal-ordering rule: the parent
    /// agreement must be effective (or past it) and the event timestamp
    /// must not precede `effective_at`.
    pub const TEMPORAL_GATED: [&str; 3] = [OFFER_MADE, ESIGN_COMPLETED, DEAL_CLOSED];
}

/// Outbox topics published to downstream consumers.
pub mod topic {
    pub const REFERRAL_CREATED: &str = "referral.created";
    pub const REFERRAL_CANCELLED: &str = "referral.cancelled";
    pub const AGREEMENT_CREATED: &str = "agreement.created";
    pub const AGREEMENT_EFFECTIVE: &str = "agreement.effective";
    pub const AGREEMENT_STATUS_CHANGED: &str = "agreement.status_changed";
}
