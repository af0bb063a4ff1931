//! Competing actors. Each runs a tight loop against its own pooled
//! connections until the stop signal flips, tolerating the errors the
//! schema is supposed to produce (unique violations, gate rejections)
//! and the connection losses chaos inflicts.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::infra::SeedIds;

fn stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Tries to insert competing pending_signature agreements for the shared
/// referral. Unique violations on the partial index are the expected
/// outcome and are counted, not raised.
pub async fn creator(
    pool: PgPool,
    seed: SeedIds,
    mut rng: StdRng,
    stop: watch::Receiver<bool>,
) -> u64 {
    let mut collisions = 0u64;
    while !stopped(&stop) {
        let result = sqlx::query(
            r#"
            INSERT INTO agreements (referral_id, from_broker_id, to_broker_id, status)
            VALUES ($1, $2, $3, 'pending_signature')
            "#,
        )
        .bind(seed.referral_id)
        .bind(seed.from_broker)
        .bind(seed.to_broker)
        .execute(&pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => collisions += 1,
            Err(e) => debug!(error = %e, "creator insert failed"),
        }

        tokio::time::sleep(Duration::from_millis(10 + rng.gen_range(0..20))).await;
    }
    collisions
}

/// Flips a pending_signature agreement to effective, appends the
/// ESIGN_COMPLETED event under the broker context, and enqueues the
/// outbox message, all in one transaction.
pub async fn signer(
    pool: PgPool,
    seed: SeedIds,
    mut rng: StdRng,
    stop: watch::Receiver<bool>,
) {
    while !stopped(&stop) {
        let outcome: Result<(), sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            // Peek without locking, then take the advisory lock before the
            // row lock to keep the global lock order the timeline guard
            // imposes.
            let candidate: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM agreements WHERE referral_id = $1 AND status = 'pending_signature' LIMIT 1",
            )
            .bind(seed.referral_id)
            .fetch_optional(&mut *tx)
            .await?;

            let row = match candidate {
                Some((agreement_id,)) => {
                    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                        .bind(agreement_id.to_string())
                        .execute(&mut *tx)
                        .await?;

                    sqlx::query_as::<_, (Uuid, Uuid)>(
                        r#"
                        UPDATE agreements
                        SET status = 'effective',
                            effective_at = COALESCE(effective_at, get_tx_timestamp())
                        WHERE id = $1 AND status = 'pending_signature'
                        RETURNING id, from_broker_id
                        "#,
                    )
                    .bind(agreement_id)
                    .fetch_optional(&mut *tx)
                    .await?
                }
                None => None,
            };

            if let Some((agreement_id, from_broker)) = row {
                sqlx::query("SELECT set_config('app.broker_id', $1, true)")
                    .bind(from_broker.to_string())
                    .execute(&mut *tx)
                    .await?;

                sqlx::query(
                    r#"
                    INSERT INTO timeline_events (agreement_id, type, payload)
                    VALUES ($1, 'ESIGN_COMPLETED', '{}'::jsonb)
                    "#,
                )
                .bind(agreement_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO outbox (topic, payload)
                    VALUES ('agreement.effective', jsonb_build_object('agreement_id', $1::uuid))
                    "#,
                )
                .bind(agreement_id)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            debug!(error = %e, "signer iteration failed");
        }

        tokio::time::sleep(Duration::from_millis(20 + rng.gen_range(0..40))).await;
    }
}

/// Alternates a direct table read (which forced RLS must starve) and the
/// gated accessor (which fails until the agreement is effective).
pub async fn pii_reader(
    pool: PgPool,
    seed: SeedIds,
    mut rng: StdRng,
    stop: watch::Receiver<bool>,
) {
    while !stopped(&stop) {
        // Row-level security must starve this read for any non-superuser
        // role; superusers bypass RLS, so the result is not asserted here.
        let _ = sqlx::query("SELECT * FROM pii_contacts WHERE agreement_id = $1")
            .bind(seed.agreement_id)
            .fetch_all(&pool)
            .await;

        let _ = sqlx::query("SELECT * FROM get_pii_contact($1, $2)")
            .bind(seed.agreement_id)
            .bind(seed.user_id)
            .fetch_all(&pool)
            .await;

        tokio::time::sleep(Duration::from_millis(30 + rng.gen_range(0..50))).await;
    }
}

/// Appends random temporal-gated events; the insert trigger rejects them
/// whenever the agreement has not gone effective yet.
pub async fn event_writer(
    pool: PgPool,
    seed: SeedIds,
    mut rng: StdRng,
    stop: watch::Receiver<bool>,
) {
    const TYPES: [&str; 2] = ["OFFER_MADE", "DEAL_CLOSED"];

    while !stopped(&stop) {
        let event_type = TYPES[rng.gen_range(0..TYPES.len())];

        let outcome: Result<(), sqlx::Error> = async {
            let mut tx = pool.begin().await?;

            sqlx::query("SELECT set_config('app.broker_id', $1, true)")
                .bind(seed.from_broker.to_string())
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO timeline_events (agreement_id, type, payload)
                VALUES ($1, $2::event_type, '{}'::jsonb)
                "#,
            )
            .bind(seed.agreement_id)
            .bind(event_type)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        }
        .await;

        // Rejections while the agreement is pre-effective are the point.
        if let Err(e) = outcome {
            debug!(error = %e, event_type, "event append rejected");
        }

        tokio::time::sleep(Duration::from_millis(15 + rng.gen_range(0..35))).await;
    }
}

/// Delivery handler that drops one in ten messages on the floor, driving
/// the worker's retry and dead-letter bookkeeping.
struct FlakyHandler {
    rng: std::sync::Mutex<StdRng>,
}

#[async_trait::async_trait]
impl refermesh_core::OutboxHandler for FlakyHandler {
    async fn handle(
        &self,
        message: &refermesh_db::DbOutboxMessage,
    ) -> Result<(), String> {
        let flaky = self.rng.lock().expect("rng lock").gen_range(0..10) == 0;
        if flaky {
            Err(format!("injected delivery failure for {}", message.topic))
        } else {
            Ok(())
        }
    }
}

/// Drains pending outbox rows through the production worker (skip-locked
/// claims, retry budget) with randomly injected delivery failures.
pub async fn outbox_worker(pool: PgPool, rng: StdRng, stop: watch::Receiver<bool>) {
    let worker = refermesh_core::OutboxWorker::new(pool)
        .with_poll_interval(Duration::from_millis(100));
    let handler = FlakyHandler { rng: std::sync::Mutex::new(rng) };

    if let Err(e) = worker.run(&handler, stop).await {
        debug!(error = %e, "outbox worker stopped with error");
    }
}

/// Registers `(route, key)` idempotently and completes the invocation;
/// only the first registrant ever performs the side effect.
pub async fn edge_adapter(
    pool: PgPool,
    route: String,
    key: String,
    stop: watch::Receiver<bool>,
) {
    while !stopped(&stop) {
        let result = refermesh_core::outbox::invoke_edge(&pool, &route, &key, || async {
            Ok::<i32, String>(200)
        })
        .await;

        if let Err(e) = result {
            debug!(error = %e, "edge adapter iteration failed");
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
    }
}

/// Opens and resolves disputes, exercising the resolution trigger's
/// cascade onto the agreement and its invoices.
pub async fn disputer(pool: PgPool, seed: SeedIds, stop: watch::Receiver<bool>) {
    while !stopped(&stop) {
        let dispute: Result<Option<(Uuid,)>, sqlx::Error> =
            sqlx::query_as("INSERT INTO disputes (agreement_id) VALUES ($1) RETURNING id")
                .bind(seed.agreement_id)
                .fetch_optional(&pool)
                .await;

        if let Ok(Some((dispute_id,))) = dispute {
            let _ = sqlx::query("UPDATE disputes SET status = 'resolved' WHERE id = $1")
                .bind(dispute_id)
                .execute(&pool)
                .await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
