// Raw metric samples + rolled-up snapshots. Samples are append-only;
// snapshots are upserted on the (agent, type, period, window start) key so
// recomputation is idempotent.

pub mod rollup;

use crate::clock::Clock;
use crate::error::ApiError;
use crate::models::{MetricSample, MetricSnapshot, MetricType, NewSample, SnapshotPeriod};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::sync::Arc;
use tracing::instrument;

pub struct MetricsRepo {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl MetricsRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                metric_type TEXT NOT NULL,
                value REAL NOT NULL,
                unit TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_metrics_agent_type_time
             ON metrics(agent_id, metric_type, recorded_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_recorded_at ON metrics(recorded_at)")
            .execute(&self.pool)
            .await?;

        rollup::init_snapshot_table(&self.pool).await?;

        Ok(())
    }

    /// Inserts a validated batch and refreshes the agent's liveness in the
    /// same transaction (an ingest always implies a heartbeat). All-or-nothing.
    #[instrument(skip(self, samples), fields(repo = "metrics", operation = "insert_samples", samples_count = samples.len()))]
    pub async fn insert_samples(
        &self,
        agent_id: &str,
        samples: &[NewSample],
    ) -> Result<(), ApiError> {
        let now = self.clock.now_ms();
        let mut tx = self.pool.begin().await?;

        for s in samples {
            sqlx::query(
                "INSERT INTO metrics (id, agent_id, metric_type, value, unit, recorded_at, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(agent_id)
            .bind(s.metric_type.as_str())
            .bind(s.value)
            .bind(&s.unit)
            .bind(s.recorded_at)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE agents SET status = 'online', last_seen_at = $1 WHERE id = $2")
            .bind(now)
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Latest sample per metric type with recorded_at >= since_ts.
    pub async fn latest_per_type(
        &self,
        agent_id: &str,
        since_ts: i64,
    ) -> Result<Vec<MetricSample>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM metrics
             WHERE agent_id = $1 AND recorded_at >= $2
             ORDER BY recorded_at DESC, created_at DESC",
        )
        .bind(agent_id)
        .bind(since_ts)
        .fetch_all(&self.pool)
        .await?;

        let mut seen: Vec<MetricType> = Vec::new();
        let mut out = Vec::new();
        for row in rows {
            let sample = parse_sample_row(&row)?;
            if !seen.contains(&sample.metric_type) {
                seen.push(sample.metric_type);
                out.push(sample);
            }
        }
        Ok(out)
    }

    /// Raw samples in [from_ts, now], optionally filtered by type, ascending.
    #[instrument(skip(self), fields(repo = "metrics", operation = "samples_since"))]
    pub async fn samples_since(
        &self,
        agent_id: &str,
        from_ts: i64,
        metric_type: Option<MetricType>,
    ) -> Result<Vec<MetricSample>, ApiError> {
        let rows = match metric_type {
            Some(t) => {
                sqlx::query(
                    "SELECT * FROM metrics
                     WHERE agent_id = $1 AND metric_type = $2 AND recorded_at >= $3
                     ORDER BY recorded_at ASC",
                )
                .bind(agent_id)
                .bind(t.as_str())
                .bind(from_ts)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM metrics
                     WHERE agent_id = $1 AND recorded_at >= $2
                     ORDER BY recorded_at ASC",
                )
                .bind(agent_id)
                .bind(from_ts)
                .fetch_all(&self.pool)
                .await?
            }
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_sample_row(&row)?);
        }
        Ok(out)
    }

    /// All samples in the half-open window [from_ts, to_ts), fleet-wide, for
    /// the rollup sweep.
    pub async fn samples_in_window(
        &self,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<(String, MetricType, f64)>, ApiError> {
        let rows = sqlx::query(
            "SELECT agent_id, metric_type, value FROM metrics
             WHERE recorded_at >= $1 AND recorded_at < $2",
        )
        .bind(from_ts)
        .bind(to_ts)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let agent_id: String = row.try_get("agent_id")?;
            let type_str: String = row.try_get("metric_type")?;
            let Some(metric_type) = MetricType::parse(&type_str) else {
                tracing::debug!(metric_type = %type_str, "unknown metric type in store, skipping");
                continue;
            };
            let value: f64 = row.try_get("value")?;
            out.push((agent_id, metric_type, value));
        }
        Ok(out)
    }

    /// Idempotent write keyed by (agent, type, period, window start).
    #[instrument(skip(self, snapshot), fields(repo = "metrics", operation = "upsert_snapshot"))]
    pub async fn upsert_snapshot(&self, snapshot: &MetricSnapshot) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO metric_snapshots
             (agent_id, metric_type, avg_value, min_value, max_value, low_value, high_value,
              snapshot_period, snapshot_time, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT(agent_id, metric_type, snapshot_period, snapshot_time) DO UPDATE SET
                avg_value = excluded.avg_value,
                min_value = excluded.min_value,
                max_value = excluded.max_value,
                low_value = excluded.low_value,
                high_value = excluded.high_value",
        )
        .bind(&snapshot.agent_id)
        .bind(snapshot.metric_type.as_str())
        .bind(snapshot.avg_value)
        .bind(snapshot.min_value)
        .bind(snapshot.max_value)
        .bind(snapshot.low_value)
        .bind(snapshot.high_value)
        .bind(snapshot.snapshot_period.as_str())
        .bind(snapshot.snapshot_time)
        .bind(self.clock.now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Snapshots for a period with snapshot_time >= from_ts, ascending.
    #[instrument(skip(self), fields(repo = "metrics", operation = "snapshots_since"))]
    pub async fn snapshots_since(
        &self,
        agent_id: &str,
        period: SnapshotPeriod,
        from_ts: i64,
        metric_type: Option<MetricType>,
    ) -> Result<Vec<MetricSnapshot>, ApiError> {
        let rows = match metric_type {
            Some(t) => {
                sqlx::query(
                    "SELECT * FROM metric_snapshots
                     WHERE agent_id = $1 AND snapshot_period = $2 AND metric_type = $3
                       AND snapshot_time >= $4
                     ORDER BY snapshot_time ASC",
                )
                .bind(agent_id)
                .bind(period.as_str())
                .bind(t.as_str())
                .bind(from_ts)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM metric_snapshots
                     WHERE agent_id = $1 AND snapshot_period = $2 AND snapshot_time >= $3
                     ORDER BY snapshot_time ASC",
                )
                .bind(agent_id)
                .bind(period.as_str())
                .bind(from_ts)
                .fetch_all(&self.pool)
                .await?
            }
        };
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_snapshot_row(&row)?);
        }
        Ok(out)
    }

    /// Delete raw samples with recorded_at < cutoff_ts.
    #[instrument(skip(self), fields(repo = "metrics", operation = "prune_raw_before"))]
    pub async fn prune_raw_before(&self, cutoff_ts: i64) -> Result<u64, ApiError> {
        let r = sqlx::query("DELETE FROM metrics WHERE recorded_at < $1")
            .bind(cutoff_ts)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Delete snapshots with snapshot_time < cutoff_ts.
    #[instrument(skip(self), fields(repo = "metrics", operation = "prune_snapshots_before"))]
    pub async fn prune_snapshots_before(&self, cutoff_ts: i64) -> Result<u64, ApiError> {
        let r = sqlx::query("DELETE FROM metric_snapshots WHERE snapshot_time < $1")
            .bind(cutoff_ts)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Reclaim space after pruning (run on the vacuum schedule).
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> Result<(), ApiError> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_sample_row(row: &SqliteRow) -> Result<MetricSample, sqlx::Error> {
    let type_str: String = row.try_get("metric_type")?;
    let metric_type = MetricType::parse(&type_str).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "metric_type".into(),
        source: format!("unknown metric type: {}", type_str).into(),
    })?;
    Ok(MetricSample {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        metric_type,
        value: row.try_get("value")?,
        unit: row.try_get("unit")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn parse_snapshot_row(row: &SqliteRow) -> Result<MetricSnapshot, sqlx::Error> {
    let type_str: String = row.try_get("metric_type")?;
    let metric_type = MetricType::parse(&type_str).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "metric_type".into(),
        source: format!("unknown metric type: {}", type_str).into(),
    })?;
    let period_str: String = row.try_get("snapshot_period")?;
    let snapshot_period =
        SnapshotPeriod::parse(&period_str).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "snapshot_period".into(),
            source: format!("unknown snapshot period: {}", period_str).into(),
        })?;
    Ok(MetricSnapshot {
        agent_id: row.try_get("agent_id")?,
        metric_type,
        avg_value: row.try_get("avg_value")?,
        min_value: row.try_get("min_value")?,
        max_value: row.try_get("max_value")?,
        low_value: row.try_get("low_value")?,
        high_value: row.try_get("high_value")?,
        snapshot_period,
        snapshot_time: row.try_get("snapshot_time")?,
    })
}
