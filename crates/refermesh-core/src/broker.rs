//! Broker profile lookup.

use refermesh_db::DbBroker;
use refermesh_types::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct BrokerService {
    pool: PgPool,
}

impl BrokerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<DbBroker> {
        sqlx::query_as::<_, DbBroker>(
            "SELECT id, name, fein, verified, created_at FROM brokers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CoreError::NotFound("broker"))
    }

    pub async fn list(&self, limit: i64) -> CoreResult<Vec<DbBroker>> {
        let limit = if limit <= 0 || limit > 100 { 100 } else { limit };

        let brokers = sqlx::query_as::<_, DbBroker>(
            "SELECT id, name, fein, verified, created_at FROM brokers ORDER BY name ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(brokers)
    }
}
