//! Dispute lifecycle. Resolution cascades onto the agreement and its
//! invoices through the storage trigger, atomically with the update.

use refermesh_db::DbDispute;
use refermesh_types::{CoreError, CoreResult, DisputeStatus};
use sqlx::PgPool;
use uuid::Uuid;

const DISPUTE_COLS: &str = "d.id, d.agreement_id, d.status, d.created_at, d.updated_at, d.resolved_at";

#[derive(Clone)]
pub struct DisputeService {
    pool: PgPool,
}

impl DisputeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists the caller's disputes, optionally narrowed to one agreement.
    pub async fn list(
        &self,
        owner_id: Uuid,
        agreement_id: Option<Uuid>,
    ) -> CoreResult<Vec<DbDispute>> {
        let rows = if let Some(agreement_id) = agreement_id {
            sqlx::query_as::<_, DbDispute>(&format!(
                r#"
                SELECT {DISPUTE_COLS}
                FROM disputes d
                JOIN agreements a ON a.id = d.agreement_id
                JOIN referral_requests rr ON rr.id = a.referral_id
                WHERE rr.created_by_user_id = $1 AND d.agreement_id = $2
                ORDER BY d.created_at DESC
                "#
            ))
            .bind(owner_id)
            .bind(agreement_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, DbDispute>(&format!(
                r#"
                SELECT {DISPUTE_COLS}
                FROM disputes d
                JOIN agreements a ON a.id = d.agreement_id
                JOIN referral_requests rr ON rr.id = a.referral_id
                WHERE rr.created_by_user_id = $1
                ORDER BY d.created_at DESC
                "#
            ))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    /// Opens a dispute on an agreement the caller owns; the guarded insert
    /// returns nothing for agreements that are absent or not theirs.
    pub async fn create(&self, owner_id: Uuid, agreement_id: Uuid) -> CoreResult<DbDispute> {
        let row = sqlx::query_as::<_, DbDispute>(
            r#"
            INSERT INTO disputes (agreement_id, status)
            SELECT $1, 'under_review'
            FROM agreements a
            JOIN referral_requests rr ON rr.id = a.referral_id
            WHERE a.id = $1 AND rr.created_by_user_id = $2
            RETURNING id, agreement_id, status, created_at, updated_at, resolved_at
            "#,
        )
        .bind(agreement_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(CoreError::NotFound("agreement"))
    }

    /// Resolves a dispute. The update only matches an unresolved dispute
    /// the caller owns; when it misses, a second read disambiguates
    /// "already resolved" from "not yours / absent".
    pub async fn resolve(&self, owner_id: Uuid, dispute_id: Uuid) -> CoreResult<DbDispute> {
        let resolved = sqlx::query_as::<_, DbDispute>(
            r#"
            UPDATE disputes d
            SET status = 'resolved'
            FROM agreements a
            JOIN referral_requests rr ON rr.id = a.referral_id
            WHERE d.id = $1
              AND d.agreement_id = a.id
              AND rr.created_by_user_id = $2
              AND d.status <> 'resolved'
            RETURNING d.id, d.agreement_id, d.status, d.created_at, d.updated_at, d.resolved_at
            "#,
        )
        .bind(dispute_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = resolved {
            return Ok(row);
        }

        let status: Option<DisputeStatus> = sqlx::query_scalar(
            r#"
            SELECT d.status
            FROM disputes d
            JOIN agreements a ON a.id = d.agreement_id
            JOIN referral_requests rr ON rr.id = a.referral_id
            WHERE d.id = $1 AND rr.created_by_user_id = $2
            "#,
        )
        .bind(dispute_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        match status {
            Some(DisputeStatus::Resolved) => Err(CoreError::InvalidState(
                "dispute already resolved".to_string(),
            )),
            _ => Err(CoreError::NotFound("dispute")),
        }
    }
}
