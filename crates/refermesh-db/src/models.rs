//! Database models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use refermesh_types::{
    AgreementStatus, DisputeStatus, EdgeStatus, MatchState, OutboxStatus, ReferralStatus, UserRole,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub broker_id: Option<Uuid>,
    pub languages: Vec<String>,
    pub rating: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbBroker {
    pub id: Uuid,
    pub name: String,
    pub fein: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbReferralRequest {
    pub id: Uuid,
    pub created_by_user_id: Uuid,
    pub region: Vec<String>,
    pub price_min: i64,
    pub price_max: i64,
    pub property_type: String,
    pub deal_type: String,
    pub languages: Vec<String>,
    pub sla_hours: i32,
    pub status: ReferralStatus,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbReferralMatch {
    pub id: Uuid,
    pub request_id: Uuid,
    pub candidate_user_id: Uuid,
    pub state: MatchState,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAgreement {
    pub id: Uuid,
    pub referral_id: Uuid,
    pub from_broker_id: Uuid,
    pub to_broker_id: Uuid,
    pub region: Option<String>,
    pub status: AgreementStatus,
    pub effective_at: Option<DateTime<Utc>>,
    pub pii_first_access_time: Option<DateTime<Utc>>,
    pub event_seq: i64,
    pub fee_rate: Decimal,
    pub protect_days: i32,
    pub status_updated_at: DateTime<Utc>,
    pub status_updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbTimelineEvent {
    pub id: i64,
    pub agreement_id: Uuid,
    pub seq: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub payload_version: i16,
    pub actor_id: Option<Uuid>,
    pub actor_broker_id: Option<Uuid>,
    pub ts: Option<DateTime<Utc>>,
}

/// The only shape PII ever leaves storage in: the three client fields,
/// never row identifiers.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PiiContact {
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAuditLog {
    pub id: i64,
    pub agreement_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub metadata: serde_json::Value,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbOutboxMessage {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEdgeInvocation {
    pub route: String,
    pub key: String,
    pub status: EdgeStatus,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub response_code: Option<i32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDispute {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub status: DisputeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbInvoice {
    pub id: Uuid,
    pub agreement_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub is_invalidated: bool,
    pub created_at: DateTime<Utc>,
}
