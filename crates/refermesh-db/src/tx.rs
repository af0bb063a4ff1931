//! Transaction-scoped helpers.
//!
//! Everything here runs inside a caller-owned transaction and leans on the
//! database for time (`get_tx_timestamp()`) and for the transaction-local
//! actor-broker variable the timeline guard requires.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DbError, DbResult};

/// The single source of time inside a transaction.
pub async fn tx_now(conn: &mut PgConnection) -> DbResult<DateTime<Utc>> {
    let (now,): (DateTime<Utc>,) = sqlx::query_as("SELECT get_tx_timestamp()")
        .fetch_one(conn)
        .await?;
    Ok(now)
}

/// Takes the transaction-level advisory lock keyed by hash(agreement_id).
/// The timeline insert guard takes the same lock, so every writer that
/// acquires it before touching the agreement row observes one global lock
/// order: advisory lock, then row lock.
pub async fn acquire_agreement_lock(
    conn: &mut PgConnection,
    agreement_id: Uuid,
) -> DbResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(agreement_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Sets the transaction-local `app.broker_id` variable consumed by the
/// timeline insert guard. Prefers the actor's own broker when the actor is
/// a party to the agreement, otherwise stamps the referring broker. Resets
/// on commit/rollback because the setting is transaction-scoped.
pub async fn set_actor_broker(
    conn: &mut PgConnection,
    from_broker_id: Uuid,
    to_broker_id: Uuid,
    actor_id: Option<Uuid>,
) -> DbResult<()> {
    let mut broker_id = from_broker_id;
    if let Some(actor) = actor_id {
        let actor_broker: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT broker_id FROM users WHERE id = $1")
                .bind(actor)
                .fetch_optional(&mut *conn)
                .await?;
        if let Some(Some(b)) = actor_broker {
            if b == from_broker_id || b == to_broker_id {
                broker_id = b;
            }
        }
    }

    set_broker_context(conn, broker_id).await
}

/// Sets `app.broker_id` to an explicit broker.
pub async fn set_broker_context(conn: &mut PgConnection, broker_id: Uuid) -> DbResult<()> {
    sqlx::query("SELECT set_config('app.broker_id', $1, true)")
        .bind(broker_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Reserves an idempotency key inside the active transaction. A unique
/// violation means the operation already ran.
pub async fn insert_idempotency_key(conn: &mut PgConnection, key: &str) -> DbResult<()> {
    if key.is_empty() {
        return Err(DbError::Constraint("empty idempotency key".to_string()));
    }

    match sqlx::query("INSERT INTO idempotency (key) VALUES ($1)")
        .bind(key)
        .execute(conn)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            let err = DbError::Query(e);
            if err.is_unique_violation() {
                Err(DbError::Duplicate(format!("idempotency key {key}")))
            } else {
                Err(err)
            }
        }
    }
}
