//! Chaos injector: randomly terminates backends of the test database so
//! the invariants get exercised across connection loss and mid-flight
//! transaction aborts.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::debug;

pub async fn terminate_random_backend(
    pool: PgPool,
    mut rng: StdRng,
    stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        ticker.tick().await;
        if *stop.borrow() {
            return;
        }

        if rng.gen_range(0..5) == 0 {
            let result = sqlx::query(
                r#"
                SELECT pg_terminate_backend(pid)
                FROM pg_stat_activity
                WHERE datname = current_database() AND pid <> pg_backend_pid()
                ORDER BY random()
                LIMIT 1
                "#,
            )
            .execute(&pool)
            .await;

            if let Err(e) = result {
                debug!(error = %e, "chaos termination failed");
            }
        }
    }
}
