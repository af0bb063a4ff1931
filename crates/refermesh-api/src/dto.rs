//! Response DTOs. All fields camelCase, timestamps RFC3339 in UTC, ids
//! rendered as opaque strings.

use chrono::{DateTime, Utc};
use refermesh_db::{
    DbAgreement, DbBroker, DbDispute, DbReferralMatch, DbReferralRequest, DbTimelineEvent, DbUser,
};
use refermesh_types::UserRole;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub languages: Vec<String>,
    pub broker_id: Option<Uuid>,
    pub rating: f32,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbUser> for UserResponse {
    fn from(u: DbUser) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            phone: u.phone.unwrap_or_default(),
            languages: u.languages,
            broker_id: u.broker_id,
            rating: u.rating,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub id: Uuid,
    pub creator_agent_id: Uuid,
    pub region: Vec<String>,
    pub price_min: i64,
    pub price_max: i64,
    pub property_type: String,
    pub deal_type: String,
    pub languages: Vec<String>,
    pub sla_hours: i32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbReferralRequest> for ReferralResponse {
    fn from(r: DbReferralRequest) -> Self {
        Self {
            id: r.id,
            creator_agent_id: r.created_by_user_id,
            region: r.region,
            price_min: r.price_min,
            price_max: r.price_max,
            property_type: r.property_type,
            deal_type: r.deal_type,
            languages: r.languages,
            sla_hours: r.sla_hours,
            status: r.status.as_str().to_string(),
            cancel_reason: r.cancel_reason,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub id: Uuid,
    pub candidate_agent_id: Uuid,
    pub state: String,
    pub score: f32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement: Option<AgreementResponse>,
}

impl From<DbReferralMatch> for MatchResponse {
    fn from(m: DbReferralMatch) -> Self {
        Self {
            id: m.id,
            candidate_agent_id: m.candidate_user_id,
            state: m.state.as_str().to_string(),
            score: m.score,
            created_at: m.created_at,
            agreement: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub referrer_broker_id: Uuid,
    pub referee_broker_id: Uuid,
    pub status: String,
    pub fee_rate: Decimal,
    pub protect_days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbAgreement> for AgreementResponse {
    fn from(a: DbAgreement) -> Self {
        Self {
            id: a.id,
            request_id: a.referral_id,
            referrer_broker_id: a.from_broker_id,
            referee_broker_id: a.to_broker_id,
            status: a.status.as_str().to_string(),
            fee_rate: a.fee_rate,
            protect_days: a.protect_days,
            effective_at: a.effective_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeResponse {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<DbDispute> for DisputeResponse {
    fn from(d: DbDispute) -> Self {
        let status = match d.status {
            refermesh_types::DisputeStatus::UnderReview => "under_review",
            refermesh_types::DisputeStatus::Resolved => "resolved",
        };
        Self {
            id: d.id,
            agreement_id: d.agreement_id,
            status: status.to_string(),
            created_at: d.created_at,
            updated_at: d.updated_at,
            resolved_at: d.resolved_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerResponse {
    pub id: Uuid,
    pub name: String,
    pub fein: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbBroker> for BrokerResponse {
    fn from(b: DbBroker) -> Self {
        Self {
            id: b.id,
            name: b.name,
            fein: b.fein.unwrap_or_default(),
            verified: b.verified,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEventResponse {
    pub id: String,
    pub agreement_id: Uuid,
    pub seq: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_broker_id: Option<Uuid>,
}

impl From<DbTimelineEvent> for TimelineEventResponse {
    fn from(e: DbTimelineEvent) -> Self {
        Self {
            id: e.id.to_string(),
            agreement_id: e.agreement_id,
            seq: e.seq,
            event_type: e.event_type,
            at: e.ts,
            payload: Some(e.payload).filter(|p| !p.is_null()),
            actor_broker_id: e.actor_broker_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
