//! The gated PII accessor.
//!
//! Direct reads of `pii_contacts` are denied by forced row-level security;
//! the only path to client contact details is `get_pii_contact`, which
//! checks the effective gate, stamps the first-access watermark, and
//! writes a PII_READ audit row before returning the three client fields.

use refermesh_db::PiiContact;
use refermesh_types::{CoreError, CoreResult};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PiiService {
    pool: PgPool,
}

impl PiiService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_contact(&self, agreement_id: Uuid, actor_id: Uuid) -> CoreResult<PiiContact> {
        let contact = sqlx::query_as::<_, PiiContact>(
            "SELECT client_name, client_phone, client_email FROM get_pii_contact($1, $2)",
        )
        .bind(agreement_id)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_gate_error)?;

        contact.ok_or(CoreError::NotFound("pii contact"))
    }
}

/// The accessor raises `P0002` for a missing agreement and `42501` when
/// the gate is closed; everything else is infrastructure.
fn map_gate_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("P0002") => return CoreError::NotFound("agreement"),
            Some("42501") => return CoreError::Forbidden,
            _ => {}
        }
    }
    CoreError::Infrastructure(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_errors_map_to_kinds() {
        // Non-database errors pass through as infrastructure.
        let err = map_gate_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, CoreError::Infrastructure(_)));
    }
}
