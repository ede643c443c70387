// Pre-aggregated statistical snapshots (rollups)

use serde::{Deserialize, Serialize};

use super::MetricType;

/// Rollup granularity. Windows are half-open [start, start + period) and
/// aligned to period boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotPeriod {
    #[serde(rename = "1min")]
    OneMin,
    #[serde(rename = "5min")]
    FiveMin,
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
}

impl SnapshotPeriod {
    pub const ALL: [SnapshotPeriod; 4] = [
        SnapshotPeriod::OneMin,
        SnapshotPeriod::FiveMin,
        SnapshotPeriod::OneHour,
        SnapshotPeriod::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotPeriod::OneMin => "1min",
            SnapshotPeriod::FiveMin => "5min",
            SnapshotPeriod::OneHour => "1hour",
            SnapshotPeriod::OneDay => "1day",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1min" => Some(SnapshotPeriod::OneMin),
            "5min" => Some(SnapshotPeriod::FiveMin),
            "1hour" => Some(SnapshotPeriod::OneHour),
            "1day" => Some(SnapshotPeriod::OneDay),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        match self {
            SnapshotPeriod::OneMin => 60_000,
            SnapshotPeriod::FiveMin => 300_000,
            SnapshotPeriod::OneHour => 3_600_000,
            SnapshotPeriod::OneDay => 86_400_000,
        }
    }
}

/// Statistical summary of one (agent, metric type, period, window).
/// Unique per that key; recomputation overwrites, never duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub agent_id: String,
    pub metric_type: MetricType,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    /// 25th percentile.
    pub low_value: f64,
    /// 75th percentile.
    pub high_value: f64,
    pub snapshot_period: SnapshotPeriod,
    /// Window start, epoch ms.
    pub snapshot_time: i64,
}
