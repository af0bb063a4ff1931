//! Refermesh Server - the broker-to-broker referral marketplace API
//!
//! Boot sequence: tracing, connection pool, embedded migrations, router,
//! serve until ctrl-c. All state lives in PostgreSQL; this binary holds
//! only the pool.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use refermesh_api::AppState;
use refermesh_core::{OutboxHandler, OutboxWorker};
use refermesh_db::{Database, DatabaseConfig, DbOutboxMessage};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default delivery path when no downstream broker is wired up: record
/// the message and mark it processed. Consumers are expected to be
/// idempotent either way.
struct DeliveryLogger;

#[async_trait::async_trait]
impl OutboxHandler for DeliveryLogger {
    async fn handle(&self, message: &DbOutboxMessage) -> Result<(), String> {
        tracing::info!(
            topic = %message.topic,
            payload = %message.payload,
            "outbox message delivered"
        );
        Ok(())
    }
}

/// Refermesh API server
#[derive(Parser, Debug)]
#[command(name = "refermesh-server", about = "Refermesh referral marketplace server", version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JWT signing secret
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_config = match &args.database_url {
        Some(url) => DatabaseConfig::with_url(url.clone()),
        None => DatabaseConfig::from_env(),
    };

    let db = Database::connect(&db_config)
        .await
        .context("bootstrap database pool")?;
    db.migrate().await.context("apply migrations")?;

    let jwt_secret = args
        .jwt_secret
        .unwrap_or_else(|| "dev-secret-key-change-in-production".to_string());
    if jwt_secret == "dev-secret-key-change-in-production" {
        tracing::warn!("JWT_SECRET not set, using the development fallback");
    }

    let db = Arc::new(db);
    let state = Arc::new(AppState::new(db.clone(), &jwt_secret));
    let app = refermesh_api::router(state);

    // Outbox drain loop, stopped alongside the HTTP listener.
    let (stop_tx, stop_rx) = watch::channel(false);
    let worker_pool = db.pg.clone();
    let worker = tokio::spawn(async move {
        let worker = OutboxWorker::new(worker_pool);
        if let Err(e) = worker.run(&DeliveryLogger, stop_rx).await {
            tracing::error!(error = %e, "outbox worker exited");
        }
    });

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!("Refermesh server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    let _ = stop_tx.send(true);
    let _ = worker.await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {e}");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}
