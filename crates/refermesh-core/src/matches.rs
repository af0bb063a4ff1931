//! Match lifecycle: inviting candidates and atomically projecting an
//! accepted match into a pending-signature agreement.

use refermesh_db::{ledger, tx as dbtx, DbAgreement, DbReferralMatch};
use refermesh_types::{event, topic, CoreError, CoreResult, MatchState};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Defaults applied when an agreement is materialized from a match.
const DEFAULT_MATCH_FEE_RATE: &str = "30.00";
const DEFAULT_MATCH_PROTECT_DAYS: i32 = 90;

const MATCH_COLS: &str = "id, request_id, candidate_user_id, state, score, created_at";
const AGREEMENT_COLS: &str = "id, referral_id, from_broker_id, to_broker_id, region, status, \
     effective_at, pii_first_access_time, event_seq, fee_rate, protect_days, \
     status_updated_at, status_updated_by, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct CreateMatchParams {
    pub request_id: Uuid,
    pub owner_user_id: Uuid,
    pub candidate_user_id: Uuid,
    pub score: f32,
    pub state: Option<MatchState>,
}

#[derive(Debug)]
pub struct MatchUpdateResult {
    pub match_row: DbReferralMatch,
    pub agreement: Option<DbAgreement>,
}

#[derive(Clone)]
pub struct MatchService {
    pool: PgPool,
}

impl MatchService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists matches on a referral the caller owns. Ownership failures
    /// surface as NotFound so non-owners cannot probe for existence.
    pub async fn list(&self, request_id: Uuid, owner_id: Uuid) -> CoreResult<Vec<DbReferralMatch>> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM referral_requests WHERE id = $1 AND created_by_user_id = $2)",
        )
        .bind(request_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        if !owned {
            return Err(CoreError::NotFound("referral"));
        }

        let matches = sqlx::query_as::<_, DbReferralMatch>(&format!(
            "SELECT {MATCH_COLS} FROM referral_matches WHERE request_id = $1 ORDER BY created_at DESC"
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }

    /// Invites a candidate. The insert doubles as the ownership check: it
    /// only selects a row when the caller created the referral.
    pub async fn create(&self, params: CreateMatchParams) -> CoreResult<DbReferralMatch> {
        if !(0.0..=1.0).contains(&params.score) {
            return Err(CoreError::Validation("score must be within [0, 1]".to_string()));
        }
        let state = params.state.unwrap_or(MatchState::Invited);

        let inserted = sqlx::query_as::<_, DbReferralMatch>(&format!(
            r#"
            INSERT INTO referral_matches (request_id, candidate_user_id, state, score)
            SELECT $1, $2, $3, $4
            FROM referral_requests r
            WHERE r.id = $1 AND r.created_by_user_id = $5
            RETURNING {MATCH_COLS}
            "#
        ))
        .bind(params.request_id)
        .bind(params.candidate_user_id)
        .bind(state)
        .bind(params.score)
        .bind(params.owner_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| crate::conflict_on_unique(e, "match already exists"))?;

        inserted.ok_or(CoreError::NotFound("referral"))
    }

    /// The candidate's inbox.
    pub async fn list_for_candidate(&self, candidate_id: Uuid) -> CoreResult<Vec<DbReferralMatch>> {
        let matches = sqlx::query_as::<_, DbReferralMatch>(&format!(
            "SELECT {MATCH_COLS} FROM referral_matches WHERE candidate_user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(matches)
    }

    pub async fn get(&self, match_id: Uuid) -> CoreResult<DbReferralMatch> {
        sqlx::query_as::<_, DbReferralMatch>(&format!(
            "SELECT {MATCH_COLS} FROM referral_matches WHERE id = $1"
        ))
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::NotFound("match"))
    }

    /// Candidate response to an invitation. Accepting projects the match
    /// into an agreement in the same transaction; accepting twice is
    /// idempotent and yields the same agreement.
    pub async fn update_state(
        &self,
        match_id: Uuid,
        candidate_id: Uuid,
        new_state: MatchState,
    ) -> CoreResult<MatchUpdateResult> {
        match new_state {
            MatchState::Accepted => self.accept(match_id, candidate_id).await,
            MatchState::Declined => self.decline(match_id, candidate_id).await,
            MatchState::Invited => Err(CoreError::InvalidState(
                "state must be 'accepted' or 'declined'".to_string(),
            )),
        }
    }

    async fn decline(&self, match_id: Uuid, candidate_id: Uuid) -> CoreResult<MatchUpdateResult> {
        let mut tx = self.pool.begin().await?;

        let current = lock_match(&mut *tx, match_id).await?;
        if current.candidate_user_id != candidate_id {
            return Err(CoreError::Forbidden);
        }
        if current.state == MatchState::Declined {
            return Ok(MatchUpdateResult { match_row: current, agreement: None });
        }
        if current.state != MatchState::Invited {
            return Err(CoreError::InvalidState(format!(
                "match in state {} cannot be declined",
                current.state.as_str()
            )));
        }

        let updated = sqlx::query_as::<_, DbReferralMatch>(&format!(
            "UPDATE referral_matches SET state = 'declined' WHERE id = $1 RETURNING {MATCH_COLS}"
        ))
        .bind(match_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MatchUpdateResult { match_row: updated, agreement: None })
    }

    /// The acceptance path. Lock order: match row, then referral row (plus
    /// the advisory lock taken inside the timeline trigger). The partial
    /// unique index on active agreements is the last line of defense; the
    /// pre-insert lookup returns the surviving agreement to retries.
    async fn accept(&self, match_id: Uuid, candidate_id: Uuid) -> CoreResult<MatchUpdateResult> {
        let mut tx = self.pool.begin().await?;

        let current = lock_match(&mut *tx, match_id).await?;
        if current.candidate_user_id != candidate_id {
            return Err(CoreError::Forbidden);
        }
        match current.state {
            MatchState::Accepted => {
                // Idempotent replay: fall through to return the agreement.
            }
            MatchState::Invited => {
                sqlx::query("UPDATE referral_matches SET state = 'accepted' WHERE id = $1")
                    .bind(match_id)
                    .execute(&mut *tx)
                    .await?;
            }
            MatchState::Declined => {
                return Err(CoreError::InvalidState(
                    "declined match cannot be accepted".to_string(),
                ));
            }
        }

        let linkage = sqlx::query_as::<_, ReferralLinkage>(
            r#"
            SELECT rr.created_by_user_id AS owner_user_id,
                   owner.broker_id AS owner_broker_id,
                   candidate.broker_id AS candidate_broker_id,
                   rr.status::text AS referral_status
            FROM referral_requests rr
            JOIN users owner ON owner.id = rr.created_by_user_id
            JOIN users candidate ON candidate.id = $2
            WHERE rr.id = $1
            FOR UPDATE
            "#,
        )
        .bind(current.request_id)
        .bind(candidate_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::NotFound("referral"))?;

        let owner_broker = linkage
            .owner_broker_id
            .ok_or_else(|| CoreError::Validation("referral owner has no broker".to_string()))?;
        let candidate_broker = linkage
            .candidate_broker_id
            .ok_or_else(|| CoreError::Validation("candidate has no broker".to_string()))?;

        // Single-active guard: hand back the live agreement if one exists.
        let existing = sqlx::query_as::<_, DbAgreement>(&format!(
            r#"
            SELECT {AGREEMENT_COLS}
            FROM agreements
            WHERE referral_id = $1 AND status IN ('pending_signature', 'effective')
            LIMIT 1
            "#
        ))
        .bind(current.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(agreement) = existing {
            tx.commit().await?;
            let match_row = self.get(match_id).await?;
            return Ok(MatchUpdateResult { match_row, agreement: Some(agreement) });
        }

        let agreement = sqlx::query_as::<_, DbAgreement>(&format!(
            r#"
            INSERT INTO agreements
                (referral_id, from_broker_id, to_broker_id, fee_rate, protect_days, status)
            VALUES ($1, $2, $3, $4, $5, 'pending_signature')
            RETURNING {AGREEMENT_COLS}
            "#
        ))
        .bind(current.request_id)
        .bind(owner_broker)
        .bind(candidate_broker)
        .bind(DEFAULT_MATCH_FEE_RATE.parse::<Decimal>().expect("const decimal"))
        .bind(DEFAULT_MATCH_PROTECT_DAYS)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| crate::conflict_on_unique(e, "another agreement is already active"))?;

        if linkage.referral_status == "open" {
            sqlx::query(
                r#"
                UPDATE referral_requests
                SET status = 'matched', updated_at = get_tx_timestamp()
                WHERE id = $1 AND status = 'open'
                "#,
            )
            .bind(current.request_id)
            .execute(&mut *tx)
            .await?;
        }

        let accepted_at = dbtx::tx_now(&mut *tx).await.map_err(crate::map_db_error)?;
        dbtx::set_actor_broker(&mut *tx, owner_broker, candidate_broker, Some(candidate_id))
            .await
            .map_err(crate::map_db_error)?;

        ledger::append_timeline_event(
            &mut *tx,
            agreement.id,
            event::AGREEMENT_CREATED,
            Some(candidate_id),
            &json!({
                "source": "match_acceptance",
                "match_id": match_id,
                "accepted_at": accepted_at,
                "accepted_by_user_id": candidate_id,
                "referral_owner_id": linkage.owner_user_id,
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
                "match_id": match_id,
                "candidate_id": candidate_id,
                "status": "pending_signature",
                "owner_id": linkage.owner_user_id,
            }),
        )
        .await
        .map_err(crate::map_db_error)?;

        tx.commit().await?;

        let match_row = self.get(match_id).await?;
        Ok(MatchUpdateResult { match_row, agreement: Some(agreement) })
    }
}

#[derive(sqlx::FromRow)]
struct ReferralLinkage {
    owner_user_id: Uuid,
    owner_broker_id: Option<Uuid>,
    candidate_broker_id: Option<Uuid>,
    referral_status: String,
}

async fn lock_match(conn: &mut PgConnection, match_id: Uuid) -> CoreResult<DbReferralMatch> {
    sqlx::query_as::<_, DbReferralMatch>(&format!(
        "SELECT {MATCH_COLS} FROM referral_matches WHERE id = $1 FOR UPDATE"
    ))
    .bind(match_id)
    .fetch_optional(conn)
    .await?
    .ok_or(CoreError::NotFound("match"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_terms_parse() {
        let fee = DEFAULT_MATCH_FEE_RATE.parse::<Decimal>().unwrap();
        assert_eq!(fee, rust_decimal_macros::dec!(30.00));
        assert_eq!(DEFAULT_MATCH_PROTECT_DAYS, 90);
    }

    #[tokio::test]
    async fn score_outside_unit_interval_is_rejected() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/refermesh_unused")
            .unwrap();
        let svc = MatchService::new(pool);

        for score in [-0.1_f32, 1.5_f32] {
            let err = svc
                .create(CreateMatchParams {
                    request_id: Uuid::new_v4(),
                    owner_user_id: Uuid::new_v4(),
                    candidate_user_id: Uuid::new_v4(),
                    score,
                    state: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
    }
}
