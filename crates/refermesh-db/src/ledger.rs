//! Ledger writers: timeline events, outbox messages, and the
//! edge-invocation registry.
//!
//! Timeline and outbox writes always run inside the caller's business
//! transaction so they commit or roll back with the state they describe.
//! The edge registry runs outside transactions by design: it is the fence
//! between storage and external side effects.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{DbOutboxMessage, DbResult, DbTimelineEvent};

/// Appends a timeline event. The insert trigger assigns `seq` from the
/// per-agreement counter, verifies the actor-broker context (set via
/// `tx::set_actor_broker` beforehand), and enforces temporal ordering.
pub async fn append_timeline_event(
    conn: &mut PgConnection,
    agreement_id: Uuid,
    event_type: &str,
    actor_id: Option<Uuid>,
    payload: &serde_json::Value,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO timeline_events (agreement_id, type, payload, actor_id)
        VALUES ($1, $2::event_type, $3, $4)
        "#,
    )
    .bind(agreement_id)
    .bind(event_type)
    .bind(payload)
    .bind(actor_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Enqueues an outbox message in the caller's transaction.
pub async fn enqueue_outbox(
    conn: &mut PgConnection,
    topic: &str,
    payload: &serde_json::Value,
) -> DbResult<()> {
    sqlx::query("INSERT INTO outbox (topic, payload) VALUES ($1, $2)")
        .bind(topic)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}

/// Claims a batch of pending outbox rows with skip-locked semantics,
/// oldest first. Must run inside a transaction: the row locks are what
/// keep competing workers off the same messages.
pub async fn claim_pending_outbox(
    conn: &mut PgConnection,
    limit: i64,
) -> DbResult<Vec<DbOutboxMessage>> {
    let rows = sqlx::query_as::<_, DbOutboxMessage>(
        r#"
        SELECT id, topic, payload, status, attempts, last_attempt, created_at
        FROM outbox
        WHERE status = 'pending'
        ORDER BY created_at
        FOR UPDATE SKIP LOCKED
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Marks an outbox row processed.
pub async fn mark_outbox_processed(conn: &mut PgConnection, id: Uuid) -> DbResult<()> {
    sqlx::query(
        "UPDATE outbox SET status = 'processed', last_attempt = get_tx_timestamp() WHERE id = $1",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Records a failed delivery attempt; rows past the retry budget go dead.
pub async fn mark_outbox_failed(
    conn: &mut PgConnection,
    id: Uuid,
    max_attempts: i32,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE outbox
        SET attempts = attempts + 1,
            last_attempt = get_tx_timestamp(),
            status = CASE WHEN attempts + 1 >= $2 THEN 'dead'::outbox_status
                          ELSE status END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .execute(conn)
    .await?;
    Ok(())
}

/// Attempts to register an edge invocation for `(route, key)`. Returns
/// false when another adapter already holds the registration, in which
/// case the caller must skip the external side effect.
pub async fn register_edge_invocation(pool: &PgPool, route: &str, key: &str) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO edge_invocations (route, key, status)
        VALUES ($1, $2, 'pending')
        ON CONFLICT (route, key) DO NOTHING
        "#,
    )
    .bind(route)
    .bind(key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks a registered edge invocation completed with the response code.
pub async fn complete_edge_invocation(
    pool: &PgPool,
    route: &str,
    key: &str,
    response_code: i32,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE edge_invocations
        SET status = 'completed', last_attempt_at = get_tx_timestamp(), response_code = $3
        WHERE route = $1 AND key = $2
        "#,
    )
    .bind(route)
    .bind(key)
    .bind(response_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a registered edge invocation failed with the error text.
pub async fn fail_edge_invocation(
    pool: &PgPool,
    route: &str,
    key: &str,
    error: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE edge_invocations
        SET status = 'failed', last_attempt_at = get_tx_timestamp(), error = $3
        WHERE route = $1 AND key = $2
        "#,
    )
    .bind(route)
    .bind(key)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Timeline readout, newest first, for the events API.
pub async fn list_timeline_events(
    pool: &PgPool,
    page: i64,
    page_size: i64,
) -> DbResult<(Vec<DbTimelineEvent>, i64)> {
    let events = sqlx::query_as::<_, DbTimelineEvent>(
        r#"
        SELECT id, agreement_id, seq, type::text AS type, payload, payload_version,
               actor_id, actor_broker_id, ts
        FROM timeline_events
        ORDER BY ts DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_events")
        .fetch_one(pool)
        .await?;

    Ok((events, total))
}
