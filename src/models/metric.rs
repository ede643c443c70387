// Metric sample models and the known metric type set

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Cpu,
    Memory,
    Disk,
    Network,
    Io,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Cpu => "cpu",
            MetricType::Memory => "memory",
            MetricType::Disk => "disk",
            MetricType::Network => "network",
            MetricType::Io => "io",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cpu" => Some(MetricType::Cpu),
            "memory" => Some(MetricType::Memory),
            "disk" => Some(MetricType::Disk),
            "network" => Some(MetricType::Network),
            "io" => Some(MetricType::Io),
            _ => None,
        }
    }
}

/// One stored observation. Immutable once written; retried deliveries land
/// as distinct rows.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    pub id: String,
    pub agent_id: String,
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub recorded_at: i64,
}

/// One sample as submitted by an agent (metric_type still unvalidated).
#[derive(Debug, Clone, Deserialize)]
pub struct SamplePayload {
    pub metric_type: String,
    pub value: f64,
    pub unit: Option<String>,
    pub recorded_at: Option<i64>,
}

/// A validated sample ready for insert.
#[derive(Debug, Clone)]
pub struct NewSample {
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub recorded_at: i64,
}
