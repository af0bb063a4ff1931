//! Refermesh Database Layer
//!
//! PostgreSQL persistence for the referral marketplace. All domain
//! invariants are encoded in the schema first (enums, CHECKs, a partial
//! unique index, triggers, forced row-level security); this crate only
//! hands out the pool, the embedded migrations, and the ledger write
//! helpers that run inside business transactions.

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod tx;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use models::*;

/// Embedded migrations, also runnable against externally-built pools
/// (the stress harness applies them inside an isolated schema).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database connection pool
pub struct Database {
    /// PostgreSQL connection pool
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        MIGRATOR
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> DbResult<bool> {
        let ok = sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok();
        Ok(ok)
    }
}
