//! Outbox worker and edge adapter.
//!
//! The worker drains pending messages oldest-first with skip-locked row
//! locks, delivering at-least-once; consumers are expected to be
//! idempotent. Rows that exhaust the retry budget are parked as dead.
//! The edge adapter fences external side effects through the
//! (route, key) registry so storage rollback and external calls cannot
//! diverge.

use std::time::Duration;

use refermesh_db::{ledger, DbOutboxMessage};
use refermesh_types::{CoreError, CoreResult};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Handles one outbox message. Returning an error counts as a retryable
/// delivery failure.
#[async_trait::async_trait]
pub trait OutboxHandler: Send + Sync {
    async fn handle(&self, message: &DbOutboxMessage) -> Result<(), String>;
}

pub struct OutboxWorker {
    pool: PgPool,
    batch_size: i64,
    max_attempts: i32,
    poll_interval: Duration,
}

impl OutboxWorker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_size: 10,
            max_attempts: 8,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Claims and processes one batch. Returns how many messages were
    /// handled (successfully or not).
    pub async fn run_once<H: OutboxHandler>(&self, handler: &H) -> CoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        let batch = ledger::claim_pending_outbox(&mut *tx, self.batch_size)
            .await
            .map_err(crate::map_db_error)?;
        let claimed = batch.len();

        for message in &batch {
            match handler.handle(message).await {
                Ok(()) => {
                    ledger::mark_outbox_processed(&mut *tx, message.id)
                        .await
                        .map_err(crate::map_db_error)?;
                }
                Err(reason) => {
                    warn!(
                        topic = %message.topic,
                        attempts = message.attempts,
                        %reason,
                        "outbox delivery failed"
                    );
                    ledger::mark_outbox_failed(&mut *tx, message.id, self.max_attempts)
                        .await
                        .map_err(crate::map_db_error)?;
                }
            }
        }

        tx.commit().await?;
        Ok(claimed)
    }

    /// Long-poll drain loop; exits when the shutdown signal flips. Wakes
    /// on the `outbox_wakeup` notify channel the insert trigger signals,
    /// falling back to the poll interval when the listener connection is
    /// unavailable (chaos can kill it at any time).
    pub async fn run<H: OutboxHandler>(
        &self,
        handler: &H,
        mut shutdown: watch::Receiver<bool>,
    ) -> CoreResult<()> {
        let mut listener = match sqlx::postgres::PgListener::connect_with(&self.pool).await {
            Ok(mut l) => match l.listen("outbox_wakeup").await {
                Ok(()) => Some(l),
                Err(e) => {
                    debug!(error = %e, "outbox listener unavailable, polling only");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "outbox listener unavailable, polling only");
                None
            }
        };

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let processed = match self.run_once(handler).await {
                Ok(n) => n,
                Err(CoreError::Infrastructure(e)) => {
                    // Chaos-terminated backends and pool churn are expected;
                    // back off and re-lease a connection.
                    debug!(error = %e, "outbox batch failed, retrying");
                    0
                }
                Err(e) => return Err(e),
            };

            if processed == 0 {
                let poll_interval = self.poll_interval;
                let wakeup = async {
                    match &mut listener {
                        // recv() reconnects on its own; a hard error still
                        // waits out the poll interval so a dead listener
                        // cannot spin the loop.
                        Some(l) => {
                            if l.recv().await.is_err() {
                                tokio::time::sleep(poll_interval).await;
                            }
                        }
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    _ = shutdown.changed() => return Ok(()),
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = wakeup => {}
                }
            }
        }
    }
}

/// Result of an idempotent edge invocation.
#[derive(Debug, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// This adapter registered the key and performed the side effect.
    Performed(i32),
    /// Another adapter already registered (route, key); nothing was done.
    AlreadyRegistered,
    /// This adapter registered the key but the external call failed.
    Failed(String),
}

/// Registers `(route, key)` and, if this caller won the registration,
/// performs the side effect and records the outcome. At most one completed
/// invocation can ever exist per (route, key).
pub async fn invoke_edge<F, Fut>(
    pool: &PgPool,
    route: &str,
    key: &str,
    side_effect: F,
) -> CoreResult<EdgeOutcome>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<i32, String>>,
{
    let registered = ledger::register_edge_invocation(pool, route, key)
        .await
        .map_err(crate::map_db_error)?;
    if !registered {
        return Ok(EdgeOutcome::AlreadyRegistered);
    }

    match side_effect().await {
        Ok(code) => {
            ledger::complete_edge_invocation(pool, route, key, code)
                .await
                .map_err(crate::map_db_error)?;
            Ok(EdgeOutcome::Performed(code))
        }
        Err(error) => {
            ledger::fail_edge_invocation(pool, route, key, &error)
                .await
                .map_err(crate::map_db_error)?;
            Ok(EdgeOutcome::Failed(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_overrides_apply() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/refermesh_unused")
            .unwrap();
        let worker = OutboxWorker::new(pool)
            .with_batch_size(25)
            .with_max_attempts(3)
            .with_poll_interval(Duration::from_millis(50));
        assert_eq!(worker.batch_size, 25);
        assert_eq!(worker.max_attempts, 3);
        assert_eq!(worker.poll_interval, Duration::from_millis(50));
    }
}
