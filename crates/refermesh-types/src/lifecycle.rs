//! Lifecycle enums and the agreement state machine.
//!
//! Each enum maps onto a PostgreSQL enum type of the same snake_case
//! spelling; the database is the authority on which values exist, these
//! mirrors keep the application layer honest.

use serde::{Deserialize, Serialize};

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Agent,
    BrokerAdmin,
    Client,
}

impl UserRole {
    /// Roles allowed to create referrals and act on matches.
    pub fn can_act_on_referrals(&self) -> bool {
        matches!(self, UserRole::Agent | UserRole::BrokerAdmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Agent => "agent",
            UserRole::BrokerAdmin => "broker_admin",
            UserRole::Client => "client",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agent" => Ok(UserRole::Agent),
            "broker_admin" => Ok(UserRole::BrokerAdmin),
            "client" => Ok(UserRole::Client),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

/// Lifecycle of a referral request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "referral_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Open,
    Matched,
    Signed,
    InProgress,
    Closed,
    Disputed,
    Cancelled,
}

impl ReferralStatus {
    /// Cancellation is only allowed before any agreement is signed.
    pub fn cancellable(&self) -> bool {
        matches!(self, ReferralStatus::Open | ReferralStatus::Matched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Open => "open",
            ReferralStatus::Matched => "matched",
            ReferralStatus::Signed => "signed",
            ReferralStatus::InProgress => "in_progress",
            ReferralStatus::Closed => "closed",
            ReferralStatus::Disputed => "disputed",
            ReferralStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(ReferralStatus::Open),
            "matched" => Ok(ReferralStatus::Matched),
            "signed" => Ok(ReferralStatus::Signed),
            "in_progress" => Ok(ReferralStatus::InProgress),
            "closed" => Ok(ReferralStatus::Closed),
            "disputed" => Ok(ReferralStatus::Disputed),
            "cancelled" => Ok(ReferralStatus::Cancelled),
            other => Err(format!("unknown referral status: {other}")),
        }
    }
}

/// State of a candidate invitation on a referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "referral_match_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Invited,
    Accepted,
    Declined,
}

impl MatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::Invited => "invited",
            MatchState::Accepted => "accepted",
            MatchState::Declined => "declined",
        }
    }
}

impl std::str::FromStr for MatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invited" => Ok(MatchState::Invited),
            "accepted" => Ok(MatchState::Accepted),
            "declined" => Ok(MatchState::Declined),
            other => Err(format!("unknown match state: {other}")),
        }
    }
}

/// Lifecycle of a broker-to-broker agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agreement_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    PendingSignature,
    Effective,
    Success,
    Void,
    Disputed,
    Closed,
}

impl AgreementStatus {
    /// The agreement state machine. Any pair not listed here is rejected,
    /// both here and by `agreement_validate_transition` in the database.
    pub fn can_transition_to(&self, next: AgreementStatus) -> bool {
        use AgreementStatus::*;
        matches!(
            (self, next),
            (Draft, PendingSignature)
                | (Draft, Void)
                | (PendingSignature, Effective)
                | (PendingSignature, Void)
                | (Effective, Success)
                | (Effective, Disputed)
                | (Effective, Void)
                | (Effective, Closed)
                | (Disputed, Void)
                | (Disputed, Closed)
                | (Success, Closed)
                | (Void, Closed)
        )
    }

    /// States counted against the single-active-agreement rule.
    pub fn is_active(&self) -> bool {
        matches!(self, AgreementStatus::PendingSignature | AgreementStatus::Effective)
    }

    /// States that carry `effective_at`; every other state carries none.
    pub fn requires_effective_at(&self) -> bool {
        matches!(
            self,
            AgreementStatus::Effective | AgreementStatus::Success | AgreementStatus::Disputed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementStatus::Draft => "draft",
            AgreementStatus::PendingSignature => "pending_signature",
            AgreementStatus::Effective => "effective",
            AgreementStatus::Success => "success",
            AgreementStatus::Void => "void",
            AgreementStatus::Disputed => "disputed",
            AgreementStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for AgreementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(AgreementStatus::Draft),
            "pending_signature" => Ok(AgreementStatus::PendingSignature),
            "effective" => Ok(AgreementStatus::Effective),
            "success" => Ok(AgreementStatus::Success),
            "void" => Ok(AgreementStatus::Void),
            "disputed" => Ok(AgreementStatus::Disputed),
            "closed" => Ok(AgreementStatus::Closed),
            other => Err(format!("unknown agreement status: {other}")),
        }
    }
}

/// Lifecycle of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    UnderReview,
    Resolved,
}

/// Delivery state of an outbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processed,
    Dead,
}

/// State of an idempotent edge invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "edge_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Pending,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_transitions_follow_the_state_machine() {
        use AgreementStatus::*;

        assert!(Draft.can_transition_to(PendingSignature));
        assert!(Draft.can_transition_to(Void));
        assert!(PendingSignature.can_transition_to(Effective));
        assert!(Effective.can_transition_to(Success));
        assert!(Effective.can_transition_to(Disputed));
        assert!(Effective.can_transition_to(Closed));
        assert!(Disputed.can_transition_to(Closed));
        assert!(Success.can_transition_to(Closed));
        assert!(Void.can_transition_to(Closed));

        // Backwards and skipping moves are rejected.
        assert!(!Effective.can_transition_to(PendingSignature));
        assert!(!Draft.can_transition_to(Effective));
        assert!(!Closed.can_transition_to(Draft));
        assert!(!Success.can_transition_to(Effective));
        assert!(!Void.can_transition_to(Effective));
    }

    #[test]
    fn active_states_match_the_partial_index_predicate() {
        use AgreementStatus::*;
        assert!(PendingSignature.is_active());
        assert!(Effective.is_active());
        for s in [Draft, Success, Void, Disputed, Closed] {
            assert!(!s.is_active());
        }
    }

    #[test]
    fn effective_at_presence_matches_state() {
        use AgreementStatus::*;
        for s in [Effective, Success, Disputed] {
            assert!(s.requires_effective_at());
        }
        for s in [Draft, PendingSignature, Void, Closed] {
            assert!(!s.requires_effective_at());
        }
    }

    #[test]
    fn role_and_state_parsing_round_trips() {
        assert_eq!("broker_admin".parse::<UserRole>().unwrap(), UserRole::BrokerAdmin);
        assert_eq!(" Accepted ".parse::<MatchState>().unwrap(), MatchState::Accepted);
        assert_eq!(
            "pending_signature".parse::<AgreementStatus>().unwrap(),
            AgreementStatus::PendingSignature
        );
        assert!("shrugged".parse::<MatchState>().is_err());
    }

    #[test]
    fn cancellable_only_before_signing() {
        assert!(ReferralStatus::Open.cancellable());
        assert!(ReferralStatus::Matched.cancellable());
        assert!(!ReferralStatus::Signed.cancellable());
        assert!(!ReferralStatus::Cancelled.cancellable());
    }
}
