//! The harness proper: seeding, actor spawning, the oracle sampling loop,
//! and the failure dump.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};

use crate::{actors, chaos, infra, oracles};

/// The replay tuple plus the DSN. A failing run reprints `{seed,
/// duration, concurrency}` so it can be replayed exactly.
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub dsn: String,
    pub duration: Duration,
    pub concurrency: usize,
    pub seed: u64,
}

impl StressConfig {
    /// Reads configuration from the environment:
    /// `STRESS_TEST_PG_DSN` (required), `STRESS_DURATION_SECS` (90),
    /// `STRESS_CONCURRENCY` (8), `STRESS_SEED` (clock-derived).
    pub fn from_env() -> Option<Self> {
        let dsn = std::env::var("STRESS_TEST_PG_DSN").ok()?;
        let duration = std::env::var("STRESS_DURATION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(90));
        let concurrency = std::env::var("STRESS_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8);
        let seed = std::env::var("STRESS_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0)
            });
        Some(Self { dsn, duration, concurrency, seed })
    }
}

#[derive(Debug)]
pub struct StressReport {
    pub oracle_rounds: u64,
    pub creator_collisions: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StressFailure {
    #[error("oracle {name} failed: {sample} (replay: seed={seed} duration={duration:?} concurrency={concurrency})")]
    Oracle {
        name: &'static str,
        sample: String,
        seed: u64,
        duration: Duration,
        concurrency: usize,
    },
    #[error(transparent)]
    Infra(#[from] sqlx::Error),
}

/// Runs the full stress scenario and samples every oracle every two
/// seconds until the deadline. Returns the report, or the first oracle
/// counterexample after dumping recent ledger state.
pub async fn run(config: StressConfig) -> Result<StressReport, StressFailure> {
    info!(
        seed = config.seed,
        duration_secs = config.duration.as_secs(),
        concurrency = config.concurrency,
        "stress run starting"
    );

    let env = infra::StressEnv::prepare(&config.dsn, config.seed).await?;
    let seed_ids = infra::seed(&env.pool, config.seed).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut rng_counter = config.seed;
    let mut actor_rng = move || {
        rng_counter = rng_counter.wrapping_add(1);
        StdRng::seed_from_u64(rng_counter)
    };

    let mut creators = Vec::new();
    let mut workers = Vec::new();

    // Creators and signers battle over the same referral.
    for _ in 0..config.concurrency {
        creators.push(tokio::spawn(actors::creator(
            env.pool.clone(),
            seed_ids,
            actor_rng(),
            stop_rx.clone(),
        )));
        workers.push(tokio::spawn(actors::signer(
            env.pool.clone(),
            seed_ids,
            actor_rng(),
            stop_rx.clone(),
        )));
    }

    workers.push(tokio::spawn(actors::pii_reader(
        env.pool.clone(),
        seed_ids,
        actor_rng(),
        stop_rx.clone(),
    )));
    workers.push(tokio::spawn(actors::event_writer(
        env.pool.clone(),
        seed_ids,
        actor_rng(),
        stop_rx.clone(),
    )));
    workers.push(tokio::spawn(actors::outbox_worker(
        env.pool.clone(),
        actor_rng(),
        stop_rx.clone(),
    )));
    workers.push(tokio::spawn(actors::edge_adapter(
        env.pool.clone(),
        "/thirdparty/notify".to_string(),
        format!("edge-{}", seed_ids.agreement_id),
        stop_rx.clone(),
    )));
    workers.push(tokio::spawn(actors::disputer(
        env.pool.clone(),
        seed_ids,
        stop_rx.clone(),
    )));
    workers.push(tokio::spawn(chaos::terminate_random_backend(
        env.pool.clone(),
        actor_rng(),
        stop_rx.clone(),
    )));

    // Oracle sampling loop.
    let deadline = Instant::now() + config.duration;
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let mut rounds = 0u64;
    let mut failure: Option<StressFailure> = None;

    while Instant::now() < deadline {
        ticker.tick().await;
        match oracles::run(&env.pool).await {
            Ok(None) => rounds += 1,
            Ok(Some((name, sample))) => {
                dump_recent(&env.pool).await;
                failure = Some(StressFailure::Oracle {
                    name,
                    sample,
                    seed: config.seed,
                    duration: config.duration,
                    concurrency: config.concurrency,
                });
                break;
            }
            // Chaos can kill the oracle's own connection; the next round
            // gets a fresh one from the pool.
            Err(e) => info!(error = %e, "oracle round aborted"),
        }
    }

    let _ = stop_tx.send(true);

    let mut creator_collisions = 0u64;
    for handle in creators {
        creator_collisions += handle.await.unwrap_or(0);
    }
    for handle in workers {
        let _ = handle.await;
    }

    if failure.is_none() {
        if let Err(e) = env.teardown().await {
            info!(error = %e, "teardown warning");
        }
    }

    match failure {
        Some(f) => Err(f),
        None => {
            info!(rounds, creator_collisions, "stress run passed");
            Ok(StressReport { oracle_rounds: rounds, creator_collisions })
        }
    }
}

/// Dumps the last 50 rows of the ledgers for post-mortem when an oracle
/// fails.
async fn dump_recent(pool: &PgPool) {
    let dumps = [
        (
            "timeline_events",
            "SELECT to_jsonb(t)::text FROM (SELECT id, agreement_id, seq, type, ts \
             FROM timeline_events ORDER BY id DESC LIMIT 50) t",
        ),
        (
            "outbox",
            "SELECT to_jsonb(t)::text FROM (SELECT id, topic, status, attempts, created_at \
             FROM outbox ORDER BY created_at DESC LIMIT 50) t",
        ),
        (
            "edge_invocations",
            "SELECT to_jsonb(t)::text FROM (SELECT route, key, status, last_attempt_at \
             FROM edge_invocations ORDER BY first_attempt_at DESC LIMIT 50) t",
        ),
        (
            "audit_logs",
            "SELECT to_jsonb(t)::text FROM (SELECT id, agreement_id, action, ts \
             FROM audit_logs ORDER BY id DESC LIMIT 50) t",
        ),
    ];

    for (name, sql) in dumps {
        match sqlx::query_as::<_, (String,)>(sql).fetch_all(pool).await {
            Ok(rows) => {
                error!("-- {name} --");
                for (row,) in rows {
                    error!("{row}");
                }
            }
            Err(e) => error!(error = %e, "dump {name} failed"),
        }
    }
}
