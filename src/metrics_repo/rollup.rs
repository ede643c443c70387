// Rollups: schema for the snapshot table + pure window statistics.
// DB access (fetch window, upsert, prune) stays in metrics_repo::mod.

use std::collections::BTreeMap;

use crate::models::{MetricSnapshot, MetricType, SnapshotPeriod};
use sqlx::SqlitePool;

/// Creates the metric_snapshots table and its unique key if not present.
pub async fn init_snapshot_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            metric_type TEXT NOT NULL,
            avg_value REAL NOT NULL,
            min_value REAL NOT NULL,
            max_value REAL NOT NULL,
            low_value REAL NOT NULL,
            high_value REAL NOT NULL,
            snapshot_period TEXT NOT NULL,
            snapshot_time INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_key
         ON metric_snapshots(agent_id, metric_type, snapshot_period, snapshot_time)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_agent_type_time
         ON metric_snapshots(agent_id, metric_type, snapshot_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// avg/min/max plus 25th ("low") and 75th ("high") percentile of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub low: f64,
    pub high: f64,
}

/// Floors a timestamp to the start of its window for the given period.
pub fn window_start(ts_ms: i64, period: SnapshotPeriod) -> i64 {
    let len = period.duration_ms();
    (ts_ms / len) * len
}

/// Statistics over one window's values. Percentile rule: sort ascending,
/// low = index floor(n * 0.25), high = index floor(n * 0.75), both clamped
/// to the last valid index. Empty window produces nothing.
pub fn compute_window_stats(values: &[f64]) -> Option<WindowStats> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let low_idx = ((n as f64 * 0.25).floor() as usize).min(n - 1);
    let high_idx = ((n as f64 * 0.75).floor() as usize).min(n - 1);

    Some(WindowStats {
        avg: sorted.iter().sum::<f64>() / (n as f64),
        min: sorted[0],
        max: sorted[n - 1],
        low: sorted[low_idx],
        high: sorted[high_idx],
    })
}

/// Reduces one window's fleet-wide samples into snapshots, one per
/// (agent, metric type) that has at least one sample. Output is ordered by
/// agent then type so sweeps are deterministic.
pub fn rollup_window(
    samples: &[(String, MetricType, f64)],
    window_start_ts: i64,
    period: SnapshotPeriod,
) -> Vec<MetricSnapshot> {
    let mut by_key: BTreeMap<(String, MetricType), Vec<f64>> = BTreeMap::new();
    for (agent_id, metric_type, value) in samples {
        by_key
            .entry((agent_id.clone(), *metric_type))
            .or_default()
            .push(*value);
    }

    let mut out = Vec::with_capacity(by_key.len());
    for ((agent_id, metric_type), values) in by_key {
        let Some(stats) = compute_window_stats(&values) else {
            continue;
        };
        out.push(MetricSnapshot {
            agent_id,
            metric_type,
            avg_value: stats.avg,
            min_value: stats.min,
            max_value: stats.max,
            low_value: stats.low,
            high_value: stats.high,
            snapshot_period: period,
            snapshot_time: window_start_ts,
        });
    }
    out
}
