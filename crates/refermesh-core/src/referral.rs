//! Referral request lifecycle: create, list, cancel.

use refermesh_db::DbReferralRequest;
use refermesh_types::{topic, CoreError, CoreResult, ReferralStatus, UserRole};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct CreateReferralParams {
    pub creator_user_id: Uuid,
    pub region: Vec<String>,
    pub price_min: i64,
    pub price_max: i64,
    pub property_type: String,
    pub deal_type: String,
    pub languages: Vec<String>,
    pub sla_hours: i32,
}

/// Enumerated list filters; everything else is rejected at the edge.
#[derive(Debug, Clone, Default)]
pub struct ReferralFilters {
    pub creator_user_id: Option<Uuid>,
    pub status: Option<ReferralStatus>,
    pub region: Option<String>,
    pub deal_type: Option<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort_key: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug)]
pub struct ReferralList {
    pub items: Vec<DbReferralRequest>,
    pub total: i64,
}

#[derive(Debug, Clone)]
pub struct CancelReferralParams {
    pub request_id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct ReferralService {
    pool: PgPool,
}

const RETURNING_COLS: &str = "id, created_by_user_id, region, price_min, price_max, \
     property_type, deal_type, languages, sla_hours, status, cancel_reason, created_at, updated_at";

impl ReferralService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, params: CreateReferralParams) -> CoreResult<DbReferralRequest> {
        if params.region.is_empty() {
            return Err(CoreError::Validation("region required".to_string()));
        }
        if params.price_min <= 0 || params.price_max <= 0 || params.price_min >= params.price_max {
            return Err(CoreError::Validation("invalid price range".to_string()));
        }
        if params.sla_hours <= 0 {
            return Err(CoreError::Validation("invalid SLA hours".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, DbReferralRequest>(&format!(
            r#"
            INSERT INTO referral_requests
                (created_by_user_id, region, price_min, price_max, property_type,
                 deal_type, languages, sla_hours, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'open')
            RETURNING {RETURNING_COLS}
            "#
        ))
        .bind(params.creator_user_id)
        .bind(&params.region)
        .bind(params.price_min)
        .bind(params.price_max)
        .bind(&params.property_type)
        .bind(&params.deal_type)
        .bind(&params.languages)
        .bind(params.sla_hours)
        .fetch_one(&mut *tx)
        .await?;

        refermesh_db::ledger::enqueue_outbox(
            &mut *tx,
            topic::REFERRAL_CREATED,
            &json!({ "referral_id": created.id, "status": created.status }),
        )
        .await
        .map_err(db_err)?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn list(&self, mut filters: ReferralFilters) -> CoreResult<ReferralList> {
        if filters.page <= 0 {
            filters.page = 1;
        }
        if filters.page_size <= 0 || filters.page_size > MAX_PAGE_SIZE {
            filters.page_size = DEFAULT_PAGE_SIZE;
        }

        let sort_key = map_sort_key(filters.sort_key.as_deref().unwrap_or("createdAt"));
        let sort_order = match filters.sort_order.as_deref() {
            Some(o) if o.eq_ignore_ascii_case("asc") => "ASC",
            _ => "DESC",
        };

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {RETURNING_COLS} FROM referral_requests WHERE 1=1"
        ));
        push_filters(&mut query, &filters);
        query.push(format!(" ORDER BY {sort_key} {sort_order}"));
        query.push(" LIMIT ");
        query.push_bind(filters.page_size);
        query.push(" OFFSET ");
        query.push_bind((filters.page - 1) * filters.page_size);

        let items = query
            .build_query_as::<DbReferralRequest>()
            .fetch_all(&self.pool)
            .await?;

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM referral_requests WHERE 1=1");
        push_filters(&mut count, &filters);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(ReferralList { items, total })
    }

    pub async fn cancel(&self, params: CancelReferralParams) -> CoreResult<DbReferralRequest> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, DbReferralRequest>(&format!(
            "SELECT {RETURNING_COLS} FROM referral_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(params.request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CoreError::NotFound("referral"))?;

        if !params.actor_role.can_act_on_referrals() {
            return Err(CoreError::Forbidden);
        }
        if params.actor_role != UserRole::BrokerAdmin
            && current.created_by_user_id != params.actor_id
        {
            return Err(CoreError::Forbidden);
        }
        if !current.status.cancellable() {
            return Err(CoreError::InvalidState(format!(
                "referral in state {} cannot be cancelled",
                current.status.as_str()
            )));
        }

        let reason = params
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        let updated = sqlx::query_as::<_, DbReferralRequest>(&format!(
            r#"
            UPDATE referral_requests
            SET status = 'cancelled', cancel_reason = $2, updated_at = get_tx_timestamp()
            WHERE id = $1
            RETURNING {RETURNING_COLS}
            "#
        ))
        .bind(params.request_id)
        .bind(&reason)
        .fetch_one(&mut *tx)
        .await?;

        let mut payload = json!({ "referral_id": updated.id, "status": updated.status });
        if let Some(reason) = &updated.cancel_reason {
            payload["reason"] = json!(reason);
        }
        refermesh_db::ledger::enqueue_outbox(&mut *tx, topic::REFERRAL_CANCELLED, &payload)
            .await
            .map_err(db_err)?;

        tx.commit().await?;
        Ok(updated)
    }

}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &ReferralFilters) {
    if let Some(creator) = filters.creator_user_id {
        query.push(" AND created_by_user_id = ");
        query.push_bind(creator);
    }
    if let Some(status) = filters.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(region) = &filters.region {
        query.push(" AND ");
        query.push_bind(region.clone());
        query.push(" = ANY(region)");
    }
    if let Some(deal_type) = &filters.deal_type {
        query.push(" AND deal_type = ");
        query.push_bind(deal_type.clone());
    }
}

/// Maps the public camelCase sort keys onto columns. Unknown keys fall
/// back to creation time rather than erroring, matching the list contract.
fn map_sort_key(key: &str) -> &'static str {
    match key {
        "priceMin" => "price_min",
        "priceMax" => "price_max",
        "slaHours" => "sla_hours",
        "status" => "status",
        "updatedAt" => "updated_at",
        _ => "created_at",
    }
}

use crate::map_db_error as db_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_map_to_columns() {
        assert_eq!(map_sort_key("priceMin"), "price_min");
        assert_eq!(map_sort_key("priceMax"), "price_max");
        assert_eq!(map_sort_key("slaHours"), "sla_hours");
        assert_eq!(map_sort_key("updatedAt"), "updated_at");
        assert_eq!(map_sort_key("status"), "status");
        assert_eq!(map_sort_key("createdAt"), "created_at");
        // unknown keys never reach the SQL string
        assert_eq!(map_sort_key("; DROP TABLE users"), "created_at");
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/refermesh_unused")
            .unwrap();
        let svc = ReferralService::new(pool);

        let base = CreateReferralParams {
            creator_user_id: Uuid::new_v4(),
            region: vec!["SEA".to_string()],
            price_min: 100,
            price_max: 500,
            property_type: "condo".to_string(),
            deal_type: "sale".to_string(),
            languages: vec![],
            sla_hours: 48,
        };

        let no_region = CreateReferralParams { region: vec![], ..base.clone() };
        assert!(matches!(
            svc.create(no_region).await,
            Err(CoreError::Validation(_))
        ));

        let inverted = CreateReferralParams { price_min: 500, price_max: 100, ..base.clone() };
        assert!(matches!(svc.create(inverted).await, Err(CoreError::Validation(_))));

        let no_sla = CreateReferralParams { sla_hours: 0, ..base };
        assert!(matches!(svc.create(no_sla).await, Err(CoreError::Validation(_))));
    }
}
