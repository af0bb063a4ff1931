//! SQL oracles. Each query asserts an invariant by construction: a
//! non-empty result set is a counterexample.

use sqlx::PgPool;

pub struct Oracle {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all() -> Vec<Oracle> {
    vec![
        Oracle {
            name: "O1_unique_active_agreement",
            sql: r#"SELECT referral_id, COUNT(*) FROM agreements
                    WHERE status IN ('pending_signature','effective')
                    GROUP BY referral_id HAVING COUNT(*) > 1"#,
        },
        Oracle {
            name: "O2_temporal_order",
            sql: r#"SELECT e.* FROM timeline_events e
                    JOIN agreements a ON a.id = e.agreement_id
                    WHERE e.type IN ('OFFER_MADE','ESIGN_COMPLETED','DEAL_CLOSED')
                    AND (a.status NOT IN ('effective','success','disputed') OR e.ts < a.effective_at)"#,
        },
        Oracle {
            name: "O3_worm_seq_monotonic",
            sql: r#"WITH seqs AS (
                        SELECT agreement_id, seq,
                               LAG(seq) OVER (PARTITION BY agreement_id ORDER BY seq) AS prev
                        FROM timeline_events)
                    SELECT * FROM seqs WHERE prev IS NOT NULL AND seq <= prev"#,
        },
        Oracle {
            name: "O4_pii_gate_bypass",
            sql: r#"SELECT * FROM audit_logs
                    WHERE action = 'PII_READ'
                      AND ts <= (SELECT effective_at FROM agreements WHERE id = audit_logs.agreement_id)"#,
        },
        Oracle {
            name: "O5_outbox_edge_idem",
            sql: r#"WITH stale AS (
                        SELECT id::text AS item FROM outbox
                        WHERE status NOT IN ('processed','dead')
                          AND now() - created_at > interval '5 minutes'
                    ),
                    dup_edge AS (
                        SELECT route || '/' || key AS item FROM edge_invocations
                        WHERE status = 'completed'
                        GROUP BY route, key HAVING COUNT(*) > 1)
                    SELECT * FROM stale
                    UNION ALL
                    SELECT * FROM dup_edge"#,
        },
        Oracle {
            name: "O6_dispute_linkage",
            sql: r#"SELECT i.* FROM invoices i
                    JOIN disputes d ON d.agreement_id = i.agreement_id
                    WHERE d.status = 'resolved' AND i.is_invalidated = false
                      AND i.status NOT IN ('paid','written_off')"#,
        },
        Oracle {
            name: "O7_region_immutable",
            sql: "SELECT * FROM agreements_region_audit",
        },
        Oracle {
            name: "O8_timeline_actor_broker",
            sql: "SELECT id FROM timeline_events WHERE actor_broker_id IS NULL",
        },
        Oracle {
            name: "O9_agreement_delete_guard",
            sql: r#"SELECT 'missing_no_delete_trigger' AS detail
                    WHERE NOT EXISTS (SELECT 1 FROM pg_trigger WHERE tgname = 'no_delete_agreements')"#,
        },
    ]
}

/// Runs every oracle; returns the first failure as (name, sample row), or
/// None when all pass.
pub async fn run(pool: &PgPool) -> Result<Option<(&'static str, String)>, sqlx::Error> {
    for oracle in all() {
        // Wrap the oracle so the sample row comes back as one jsonb text
        // column regardless of the oracle's own shape.
        let wrapped = format!("SELECT to_jsonb(q)::text FROM ({}) q LIMIT 1", oracle.sql);
        let row: Option<(String,)> = sqlx::query_as(&wrapped).fetch_optional(pool).await?;
        if let Some((sample,)) = row {
            return Ok(Some((oracle.name, sample)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_nine_oracles_are_registered() {
        let oracles = all();
        assert_eq!(oracles.len(), 9);
        for (i, oracle) in oracles.iter().enumerate() {
            assert!(oracle.name.starts_with(&format!("O{}_", i + 1)));
        }
    }
}
