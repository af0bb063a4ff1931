//! Test-database infrastructure: isolated schema per run, migrations,
//! seed data.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

/// A per-run database environment: its own schema on a shared server,
/// dropped on teardown so runs never see each other's rows.
pub struct StressEnv {
    pub pool: PgPool,
    dsn: String,
    schema: String,
}

impl StressEnv {
    /// Creates the run schema, builds a pool whose every connection sets
    /// `search_path` to it, and applies the embedded migrations inside.
    pub async fn prepare(dsn: &str, run_id: u64) -> Result<Self, sqlx::Error> {
        let schema = format!("stress_run_{run_id}");

        // A replayed seed reuses its schema name; clear any leftovers from
        // a failed run kept for post-mortem.
        let mut conn = PgConnection::connect(dsn).await?;
        conn.execute(format!(r#"DROP SCHEMA IF EXISTS "{schema}" CASCADE"#).as_str())
            .await?;
        conn.execute(format!(r#"CREATE SCHEMA "{schema}""#).as_str())
            .await?;
        conn.close().await?;

        let options: PgConnectOptions = dsn.parse::<PgConnectOptions>()?;
        let set_path = format!(r#"SET search_path TO "{schema}", public"#);
        let pool = PgPoolOptions::new()
            .max_connections(32)
            .after_connect(move |conn, _meta| {
                let set_path = set_path.clone();
                Box::pin(async move {
                    conn.execute(set_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        refermesh_db::MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| sqlx::Error::Protocol(format!("apply migrations: {e}")))?;

        Ok(Self { pool, dsn: dsn.to_string(), schema })
    }

    /// Drops the run schema. Best effort: a chaos-killed pool must not
    /// mask the run's verdict.
    pub async fn teardown(self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        let mut conn = PgConnection::connect(&self.dsn).await?;
        conn.execute(format!(r#"DROP SCHEMA IF EXISTS "{}" CASCADE"#, self.schema).as_str())
            .await?;
        conn.close().await?;
        Ok(())
    }
}

/// Ids of the rows every actor contends over.
#[derive(Debug, Clone, Copy)]
pub struct SeedIds {
    pub user_id: Uuid,
    pub from_broker: Uuid,
    pub to_broker: Uuid,
    pub referral_id: Uuid,
    pub agreement_id: Uuid,
}

/// Seeds the minimal world: one user, two brokers, one shared referral,
/// one pending-signature agreement with a PII contact and an open invoice.
pub async fn seed(pool: &PgPool, run_id: u64) -> Result<SeedIds, sqlx::Error> {
    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, full_name) VALUES ($1, 'Stress User') RETURNING id",
    )
    .bind(format!("stress-{run_id}@example.com"))
    .fetch_one(pool)
    .await?;

    let from_broker: Uuid = sqlx::query_scalar("INSERT INTO brokers (name) VALUES ($1) RETURNING id")
        .bind(format!("From Broker {run_id}"))
        .fetch_one(pool)
        .await?;
    let to_broker: Uuid = sqlx::query_scalar("INSERT INTO brokers (name) VALUES ($1) RETURNING id")
        .bind(format!("To Broker {run_id}"))
        .fetch_one(pool)
        .await?;

    let referral_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO referral_requests
            (created_by_user_id, region, price_min, price_max, deal_type, sla_hours, status)
        VALUES ($1, ARRAY['stress'], 100, 1000, 'sale', 48, 'open')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let agreement_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO agreements (referral_id, from_broker_id, to_broker_id, status)
        VALUES ($1, $2, $3, 'pending_signature')
        RETURNING id
        "#,
    )
    .bind(referral_id)
    .bind(from_broker)
    .bind(to_broker)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO pii_contacts (agreement_id, client_name, client_email)
        VALUES ($1, 'Alice', 'alice@example.com')
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(agreement_id)
    .execute(pool)
    .await?;

    sqlx::query("INSERT INTO invoices (agreement_id, amount, status) VALUES ($1, 100, 'open')")
        .bind(agreement_id)
        .execute(pool)
        .await?;

    Ok(SeedIds { user_id, from_broker, to_broker, referral_id, agreement_id })
}
