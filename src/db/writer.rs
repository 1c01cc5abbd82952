use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, warn};

use crate::config::PERSIST_BATCH_SIZE;
use crate::error::Result;
use crate::types::{ScoredRow, Window};

/// Result of one persist run. A failed batch aborts the remaining batches;
/// rows committed before the failure stay committed.
#[derive(Debug)]
pub struct PersistOutcome {
    pub persisted: usize,
    pub error: Option<String>,
}

/// Writes scored rows into performance_metrics in fixed-size batches.
pub struct MetricsWriter {
    pool: SqlitePool,
}

impl MetricsWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn persist(&self, rows: &[ScoredRow], window: Window) -> PersistOutcome {
        let since = window.since_str();
        let until = window.until_str();
        let created_at = chrono::Utc::now().timestamp();

        let mut persisted = 0usize;
        for batch in rows.chunks(PERSIST_BATCH_SIZE) {
            if let Err(e) = self.write_batch(batch, &since, &until, created_at).await {
                warn!("Persist failed after {persisted} rows: {e}");
                return PersistOutcome {
                    persisted,
                    error: Some(e.to_string()),
                };
            }
            persisted += batch.len();
        }

        info!("Persisted {persisted} metric rows for {since} → {until}");
        PersistOutcome {
            persisted,
            error: None,
        }
    }

    async fn write_batch(
        &self,
        batch: &[ScoredRow],
        since: &str,
        until: &str,
        created_at: i64,
    ) -> Result<()> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO performance_metrics (
                scope, ref_id, window_since, window_until,
                impressions, clicks, purchases, spend, revenue, ctr, roas, created_at
            ) ",
        );

        qb.push_values(batch, |mut b, row| {
            b.push_bind("ad")
                .push_bind(row.ad_id.clone())
                .push_bind(since.to_string())
                .push_bind(until.to_string())
                .push_bind(row.impressions as i64)
                .push_bind(row.clicks as i64)
                .push_bind(row.purchases as i64)
                .push_bind(row.spend)
                .push_bind(row.purchase_value)
                .push_bind(row.ctr_pct / 100.0)
                .push_bind(storage_roas(row))
                .push_bind(created_at);
        });

        qb.build().execute(&self.pool).await?;
        Ok(())
    }
}

/// ROAS for storage. Upstream ROAS is sometimes absent for low-volume ads
/// even when spend and revenue are present, so fall back to revenue/spend;
/// NULL when neither can be derived.
fn storage_roas(row: &ScoredRow) -> Option<f64> {
    if row.purchase_roas > 0.0 {
        Some(row.purchase_roas)
    } else if row.spend > 0.0 {
        Some(row.purchase_value / row.spend)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PersistedMetric;
    use chrono::NaiveDate;

    fn row(ad_id: &str, ctr_pct: f64) -> ScoredRow {
        ScoredRow {
            ad_id: ad_id.to_string(),
            ad_name: format!("ad {ad_id}"),
            impressions: 1000.0,
            clicks: 20.0,
            spend: 50.0,
            ctr_pct,
            cpm: 25.0,
            purchases: 2.0,
            purchase_value: 100.0,
            purchase_roas: 2.0,
            cvr: 0.1,
            aov: 50.0,
            rpme_profit: 75.0,
            profit: None,
            spend_weight: None,
            score: 2185.0,
        }
    }

    fn window() -> Window {
        Window {
            since: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2026, 8, 21).unwrap(),
        }
    }

    // Single connection: every connection to sqlite::memory: gets its own
    // database, so the migrated schema must stay on the one we test against.
    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn persists_450_rows_across_three_batches() {
        let pool = test_pool().await;
        let writer = MetricsWriter::new(pool.clone());
        let rows: Vec<ScoredRow> = (0..450).map(|i| row(&i.to_string(), 2.0)).collect();

        assert_eq!(rows.chunks(PERSIST_BATCH_SIZE).count(), 3);

        let outcome = writer.persist(&rows, window()).await;
        assert_eq!(outcome.persisted, 450);
        assert!(outcome.error.is_none());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM performance_metrics")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 450);
    }

    #[tokio::test]
    async fn ctr_round_trips_as_fraction() {
        let pool = test_pool().await;
        let writer = MetricsWriter::new(pool.clone());
        let outcome = writer.persist(&[row("a", 3.5)], window()).await;
        assert_eq!(outcome.persisted, 1);

        let stored: PersistedMetric =
            sqlx::query_as("SELECT * FROM performance_metrics WHERE ref_id = 'a'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!((stored.ctr - 0.035).abs() < 1e-12);
        assert!((stored.ctr * 100.0 - 3.5).abs() < 1e-9);
        assert_eq!(stored.scope, "ad");
        assert_eq!(stored.window_since, "2026-08-01");
        assert_eq!(stored.roas, Some(2.0));
    }

    #[tokio::test]
    async fn roas_falls_back_to_revenue_over_spend() {
        let pool = test_pool().await;
        let writer = MetricsWriter::new(pool.clone());
        let mut r = row("b", 2.0);
        r.purchase_roas = 0.0;
        writer.persist(&[r], window()).await;

        let stored: PersistedMetric =
            sqlx::query_as("SELECT * FROM performance_metrics WHERE ref_id = 'b'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored.roas, Some(2.0)); // 100 revenue / 50 spend
    }

    #[tokio::test]
    async fn roas_null_when_underivable() {
        let pool = test_pool().await;
        let writer = MetricsWriter::new(pool.clone());
        let mut r = row("c", 2.0);
        r.purchase_roas = 0.0;
        r.spend = 0.0;
        writer.persist(&[r], window()).await;

        let stored: PersistedMetric =
            sqlx::query_as("SELECT * FROM performance_metrics WHERE ref_id = 'c'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored.roas, None);
    }

    #[tokio::test]
    async fn batch_failure_keeps_earlier_batches_committed() {
        let pool = test_pool().await;
        // Reject inserts once 200 rows exist: batch 1 lands, batch 2 fails.
        sqlx::query(
            r#"
            CREATE TRIGGER reject_after_200 BEFORE INSERT ON performance_metrics
            WHEN (SELECT COUNT(*) FROM performance_metrics) >= 200
            BEGIN
                SELECT RAISE(ABORT, 'forced write failure');
            END
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let writer = MetricsWriter::new(pool.clone());
        let rows: Vec<ScoredRow> = (0..450).map(|i| row(&i.to_string(), 2.0)).collect();
        let outcome = writer.persist(&rows, window()).await;

        assert_eq!(outcome.persisted, 200);
        assert!(outcome.error.is_some());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM performance_metrics")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 200);
    }

    #[tokio::test]
    async fn write_failure_reports_error_not_panic() {
        let pool = test_pool().await;
        sqlx::query("DROP TABLE performance_metrics")
            .execute(&pool)
            .await
            .unwrap();

        let writer = MetricsWriter::new(pool);
        let outcome = writer.persist(&[row("a", 2.0)], window()).await;
        assert_eq!(outcome.persisted, 0);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn repeated_ingest_appends_duplicate_windows() {
        let pool = test_pool().await;
        let writer = MetricsWriter::new(pool.clone());
        writer.persist(&[row("a", 2.0)], window()).await;
        writer.persist(&[row("a", 2.0)], window()).await;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM performance_metrics")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
