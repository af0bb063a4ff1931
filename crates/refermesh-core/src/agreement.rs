//! Agreement lifecycle: creation, listing, status transitions, and the
//! idempotent e-sign completion webhook.

use refermesh_db::{ledger, tx as dbtx, DbAgreement, DbError};
use refermesh_types::{event, topic, AgreementStatus, CoreError, CoreResult};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

const AGREEMENT_COLS: &str = "id, referral_id, from_broker_id, to_broker_id, region, status, \
     effective_at, pii_first_access_time, event_seq, fee_rate, protect_days, \
     status_updated_at, status_updated_by, created_at, updated_at";

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct CreateAgreementParams {
    pub request_id: Uuid,
    pub referrer_broker_id: Uuid,
    pub referee_broker_id: Uuid,
    pub fee_rate: Decimal,
    pub protect_days: i32,
}

#[derive(Debug, Clone)]
pub struct TransitionParams {
    pub agreement_id: Uuid,
    pub actor_id: Uuid,
    pub next_status: AgreementStatus,
    pub payload: Option<Map<String, Value>>,
}

/// Normalized e-sign completion webhook.
#[derive(Debug, Clone)]
pub struct EsignCompletionRequest {
    pub agreement_id: Uuid,
    pub idempotency_key: String,
    pub actor_id: Option<Uuid>,
    pub timeline_payload: Option<Map<String, Value>>,
    pub outbox_topic: Option<String>,
    pub outbox_payload: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct AgreementService {
    pool: PgPool,
}

impl AgreementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a draft agreement on a referral the caller owns.
    pub async fn create(
        &self,
        actor_id: Uuid,
        params: CreateAgreementParams,
    ) -> CoreResult<DbAgreement> {
        if params.fee_rate < Decimal::ZERO {
            return Err(CoreError::Validation("invalid fee rate".to_string()));
        }
        if params.protect_days < 0 {
            return Err(CoreError::Validation("invalid protect days".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT created_by_user_id FROM referral_requests WHERE id = $1")
                .bind(params.request_id)
                .fetch_optional(&mut *tx)
                .await?;
        match owner {
            None => return Err(CoreError::NotFound("referral")),
            Some(owner) if owner != actor_id => return Err(CoreError::Forbidden),
            Some(_) => {}
        }

        let agreement = sqlx::query_as::<_, DbAgreement>(&format!(
            r#"
            INSERT INTO agreements
                (referral_id, from_broker_id, to_broker_id, fee_rate, protect_days, status)
            VALUES ($1, $2, $3, $4, $5, 'draft')
            RETURNING {AGREEMENT_COLS}
            "#
        ))
        .bind(params.request_id)
        .bind(params.referrer_broker_id)
        .bind(params.referee_broker_id)
        .bind(params.fee_rate)
        .bind(params.protect_days)
        .fetch_one(&mut *tx)
        .await?;

        dbtx::set_actor_broker(
            &mut *tx,
            params.referrer_broker_id,
            params.referee_broker_id,
            Some(actor_id),
        )
        .await
        .map_err(crate::map_db_error)?;

        ledger::append_timeline_event(
            &mut *tx,
            agreement.id,
            event::AGREEMENT_CREATED,
            Some(actor_id),
            &json!({
                "referral_id": params.request_id,
                "fee_rate": params.fee_rate,
                "protect_days": params.protect_days,
            }),
        )
        .await
        .map_err(crate::map_db_error)?;

        ledger::enqueue_outbox(
            &mut *tx,
            topic::AGREEMENT_CREATED,
            &json!({
                "agreement_id": agreement.id,
                "referral_id": agreement.referral_id,
                "status": "draft",
                "owner_id": actor_id,
            }),
        )
        .await
        .map_err(crate::map_db_error)?;

        tx.commit().await?;
        Ok(agreement)
    }

    /// Lists agreements whose referral the caller created.
    pub async fn list(
        &self,
        creator_user_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> CoreResult<(Vec<DbAgreement>, i64)> {
        let page = page.max(1);
        let page_size = if page_size <= 0 || page_size > MAX_PAGE_SIZE {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };

        let items = sqlx::query_as::<_, DbAgreement>(&format!(
            r#"
            SELECT {cols}
            FROM agreements a
            JOIN referral_requests r ON r.id = a.referral_id
            WHERE r.created_by_user_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            cols = AGREEMENT_COLS
                .split(", ")
                .map(|c| format!("a.{c}"))
                .collect::<Vec<_>>()
                .join(", "),
        ))
        .bind(creator_user_id)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM agreements a
            JOIN referral_requests r ON r.id = a.referral_id
            WHERE r.created_by_user_id = $1
            "#,
        )
        .bind(creator_user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    pub async fn get(&self, agreement_id: Uuid) -> CoreResult<DbAgreement> {
        sqlx::query_as::<_, DbAgreement>(&format!(
            "SELECT {AGREEMENT_COLS} FROM agreements WHERE id = $1"
        ))
        .bind(agreement_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::NotFound("agreement"))
    }

    /// Moves an agreement along the state machine. Storage validates the
    /// transition; the row lock serializes competing writers.
    pub async fn transition(&self, params: TransitionParams) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Advisory lock before the row lock, matching the timeline guard's
        // order so the append inside this transaction cannot deadlock.
        dbtx::acquire_agreement_lock(&mut *tx, params.agreement_id)
            .await
            .map_err(crate::map_db_error)?;

        let row: Option<(AgreementStatus, Uuid, Uuid)> = sqlx::query_as(
            "SELECT status, from_broker_id, to_broker_id FROM agreements WHERE id = $1 FOR UPDATE",
        )
        .bind(params.agreement_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (current, from_broker, to_broker) =
            row.ok_or(CoreError::NotFound("agreement"))?;

        let allowed: bool = sqlx::query_scalar(
            "SELECT agreement_validate_transition($1::agreement_status, $2::agreement_status)",
        )
        .bind(current)
        .bind(params.next_status)
        .fetch_one(&mut *tx)
        .await?;
        if !allowed {
            return Err(CoreError::InvalidState(format!(
                "invalid transition {} -> {}",
                current.as_str(),
                params.next_status.as_str()
            )));
        }

        // effective_at tracks the state both ways: set on entering the
        // post-signature states, cleared on leaving them, per the
        // state-time CHECK on the table.
        sqlx::query(
            r#"
            UPDATE agreements
            SET status = $2,
                effective_at = CASE
                    WHEN $2 IN ('effective', 'success', 'disputed')
                    THEN COALESCE(effective_at, get_tx_timestamp())
                    ELSE NULL
                END,
                status_updated_at = get_tx_timestamp(),
                status_updated_by = $3,
                updated_at = get_tx_timestamp()
            WHERE id = $1
            "#,
        )
        .bind(params.agreement_id)
        .bind(params.next_status)
        .bind(params.actor_id)
        .execute(&mut *tx)
        .await?;

        dbtx::set_actor_broker(&mut *tx, from_broker, to_broker, Some(params.actor_id))
            .await
            .map_err(crate::map_db_error)?;

        let mut payload = params.payload.unwrap_or_default();
        payload.insert("previous_status".to_string(), json!(current));
        payload.insert("next_status".to_string(), json!(params.next_status));
        payload.insert("actor_id".to_string(), json!(params.actor_id));

        ledger::append_timeline_event(
            &mut *tx,
            params.agreement_id,
            event::AGREEMENT_STATUS_CHANGED,
            Some(params.actor_id),
            &Value::Object(payload),
        )
        .await
        .map_err(crate::map_db_error)?;

        ledger::enqueue_outbox(
            &mut *tx,
            topic::AGREEMENT_STATUS_CHANGED,
            &json!({
                "agreement_id": params.agreement_id,
                "previous": current,
                "next": params.next_status,
            }),
        )
        .await
        .map_err(crate::map_db_error)?;

        tx.commit().await?;
        Ok(())
    }

    /// Applies the e-sign completion exactly once per idempotency key.
    /// A replayed key commits nothing and reports success.
    pub async fn handle_esign_completion(&self, req: EsignCompletionRequest) -> CoreResult<()> {
        if req.idempotency_key.is_empty() {
            return Err(CoreError::Validation("missing idempotency key".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        match dbtx::insert_idempotency_key(&mut *tx, &req.idempotency_key).await {
            Ok(()) => {}
            Err(DbError::Duplicate(_)) => return Ok(()),
            Err(e) => return Err(crate::map_db_error(e)),
        }

        dbtx::acquire_agreement_lock(&mut *tx, req.agreement_id)
            .await
            .map_err(crate::map_db_error)?;

        let row: Option<(chrono::DateTime<chrono::Utc>, Uuid, Uuid)> = sqlx::query_as(
            r#"
            UPDATE agreements
            SET status = 'effective',
                effective_at = COALESCE(effective_at, get_tx_timestamp()),
                status_updated_at = get_tx_timestamp(),
                updated_at = get_tx_timestamp()
            WHERE id = $1
            RETURNING effective_at, from_broker_id, to_broker_id
            "#,
        )
        .bind(req.agreement_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (effective_at, from_broker, to_broker) =
            row.ok_or(CoreError::NotFound("agreement"))?;

        dbtx::set_actor_broker(&mut *tx, from_broker, to_broker, req.actor_id)
            .await
            .map_err(crate::map_db_error)?;

        let mut timeline = req.timeline_payload.unwrap_or_default();
        timeline.insert("agreement_id".to_string(), json!(req.agreement_id));
        timeline.insert("effective_at".to_string(), json!(effective_at));

        ledger::append_timeline_event(
            &mut *tx,
            req.agreement_id,
            event::ESIGN_COMPLETED,
            req.actor_id,
            &Value::Object(timeline),
        )
        .await
        .map_err(crate::map_db_error)?;

        let mut outbox = req.outbox_payload.unwrap_or_default();
        outbox.insert("agreement_id".to_string(), json!(req.agreement_id));
        outbox.insert("effective_at".to_string(), json!(effective_at));
        let outbox_topic = req
            .outbox_topic
            .unwrap_or_else(|| topic::AGREEMENT_EFFECTIVE.to_string());

        ledger::enqueue_outbox(&mut *tx, &outbox_topic, &Value::Object(outbox))
            .await
            .map_err(crate::map_db_error)?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_negative_terms() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/refermesh_unused")
            .unwrap();
        let svc = AgreementService::new(pool);

        let err = svc
            .create(
                Uuid::new_v4(),
                CreateAgreementParams {
                    request_id: Uuid::new_v4(),
                    referrer_broker_id: Uuid::new_v4(),
                    referee_broker_id: Uuid::new_v4(),
                    fee_rate: Decimal::NEGATIVE_ONE,
                    protect_days: 90,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn esign_requires_a_key() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/refermesh_unused")
            .unwrap();
        let svc = AgreementService::new(pool);

        let err = svc
            .handle_esign_completion(EsignCompletionRequest {
                agreement_id: Uuid::new_v4(),
                idempotency_key: String::new(),
                actor_id: None,
                timeline_payload: None,
                outbox_topic: None,
                outbox_payload: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
