// Read side served to the dashboard/API: fleet listing with derived
// liveness, realtime, history and snapshot views. Liveness is always derived
// here from last_seen_at freshness; the stored status field is only the
// agent-reported flag.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::agent_repo::AgentRepo;
use crate::clock::Clock;
use crate::error::ApiError;
use crate::metrics_repo::MetricsRepo;
use crate::models::{Agent, AgentStatus, MetricType, ServiceRecord, SnapshotPeriod};
use crate::service_repo::ServiceRepo;

/// Read-time thresholds, from [liveness] config.
#[derive(Debug, Clone)]
pub struct LivenessPolicy {
    pub online_threshold_secs: u64,
    pub realtime_window_secs: u64,
}

pub struct QueryFacade {
    agents: Arc<AgentRepo>,
    metrics: Arc<MetricsRepo>,
    services: Arc<ServiceRepo>,
    clock: Arc<dyn Clock>,
    policy: LivenessPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub id: String,
    pub agent_id: String,
    pub hostname: String,
    pub ip_address: String,
    pub os_type: String,
    pub os_version: String,
    /// Agent-reported flag as stored.
    pub status: AgentStatus,
    /// Derived from last_seen_at freshness; may disagree with `status`.
    pub online: bool,
    pub last_seen_at: Option<i64>,
    pub service_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDetail {
    pub id: String,
    pub agent_id: String,
    pub hwid: String,
    pub hostname: String,
    pub ip_address: String,
    pub os_type: String,
    pub os_version: String,
    pub cpu_cores: i64,
    pub total_memory_mb: i64,
    pub total_disk_gb: f64,
    pub status: AgentStatus,
    pub online: bool,
    pub last_seen_at: Option<i64>,
    pub registered_at: i64,
    pub services: Vec<ServiceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEntry {
    pub value: f64,
    pub unit: String,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPoint {
    pub value: f64,
    pub recorded_at: i64,
}

/// One metric type's windowed series with statistics recomputed from the raw
/// rows (distinct from snapshot rollups).
#[derive(Debug, Clone, Serialize)]
pub struct HistorySeries {
    pub current: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub snapshot_time: i64,
}

impl QueryFacade {
    pub fn new(
        agents: Arc<AgentRepo>,
        metrics: Arc<MetricsRepo>,
        services: Arc<ServiceRepo>,
        clock: Arc<dyn Clock>,
        policy: LivenessPolicy,
    ) -> Self {
        Self {
            agents,
            metrics,
            services,
            clock,
            policy,
        }
    }

    /// Fleet listing with derived online flags and status counts.
    /// online = derived-online, error = stored error flag, offline = the rest.
    pub async fn list_agents(&self) -> Result<(Vec<AgentSummary>, FleetSummary), ApiError> {
        let now = self.clock.now_ms();
        let rows = self.agents.list_with_service_counts().await?;

        let mut summaries = Vec::with_capacity(rows.len());
        let mut online = 0;
        let mut error = 0;
        for (agent, service_count) in rows {
            let is_online = agent.is_online(now, self.policy.online_threshold_secs);
            if is_online {
                online += 1;
            } else if agent.status == AgentStatus::Error {
                error += 1;
            }
            summaries.push(AgentSummary {
                id: agent.id,
                agent_id: agent.agent_id,
                hostname: agent.hostname,
                ip_address: agent.ip_address,
                os_type: agent.os_type,
                os_version: agent.os_version,
                status: agent.status,
                online: is_online,
                last_seen_at: agent.last_seen_at,
                service_count,
            });
        }

        let total = summaries.len();
        let summary = FleetSummary {
            total,
            online,
            offline: total - online - error,
            error,
        };
        Ok((summaries, summary))
    }

    /// Agent detail plus its most recently captured service records.
    pub async fn get_agent(&self, id: &str) -> Result<AgentDetail, ApiError> {
        let agent = self.agents.get(id).await?;
        let services = self.services.recent_for_agent(id, 10).await?;
        let now = self.clock.now_ms();
        let online = agent.is_online(now, self.policy.online_threshold_secs);
        Ok(agent_detail(agent, online, services))
    }

    /// Latest sample per metric type within the realtime freshness window.
    /// Types with no fresh sample are omitted, not zero-filled.
    pub async fn realtime(&self, id: &str) -> Result<BTreeMap<String, RealtimeEntry>, ApiError> {
        self.agents.get(id).await?;
        let since = self.clock.now_ms() - (self.policy.realtime_window_secs as i64) * 1000;
        let latest = self.metrics.latest_per_type(id, since).await?;
        let mut out = BTreeMap::new();
        for sample in latest {
            out.insert(
                sample.metric_type.as_str().to_string(),
                RealtimeEntry {
                    value: sample.value,
                    unit: sample.unit,
                    recorded_at: sample.recorded_at,
                },
            );
        }
        Ok(out)
    }

    /// Raw samples over the last `hours`, grouped by type, with simple
    /// statistics recomputed on the fly from the returned set.
    pub async fn history(
        &self,
        id: &str,
        hours: u32,
        metric_type: Option<MetricType>,
    ) -> Result<BTreeMap<String, HistorySeries>, ApiError> {
        self.agents.get(id).await?;
        let from_ts = self.clock.now_ms() - (hours as i64) * 3_600_000;
        let samples = self.metrics.samples_since(id, from_ts, metric_type).await?;

        let mut grouped: BTreeMap<String, Vec<HistoryPoint>> = BTreeMap::new();
        for s in samples {
            grouped
                .entry(s.metric_type.as_str().to_string())
                .or_default()
                .push(HistoryPoint {
                    value: s.value,
                    recorded_at: s.recorded_at,
                });
        }

        let mut out = BTreeMap::new();
        for (metric_type, history) in grouped {
            let values: Vec<f64> = history.iter().map(|p| p.value).collect();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = values.iter().sum::<f64>() / (values.len() as f64);
            // samples are ascending; last is the most recent
            let current = history.last().map(|p| p.value).unwrap_or(0.0);
            out.insert(
                metric_type,
                HistorySeries {
                    current,
                    avg,
                    min,
                    max,
                    history,
                },
            );
        }
        Ok(out)
    }

    /// Pre-aggregated snapshots for the period over the last `hours`, grouped
    /// by type, ascending by window start.
    pub async fn snapshots(
        &self,
        id: &str,
        period: SnapshotPeriod,
        hours: u32,
        metric_type: Option<MetricType>,
    ) -> Result<BTreeMap<String, Vec<SnapshotEntry>>, ApiError> {
        self.agents.get(id).await?;
        let from_ts = self.clock.now_ms() - (hours as i64) * 3_600_000;
        let snapshots = self
            .metrics
            .snapshots_since(id, period, from_ts, metric_type)
            .await?;

        let mut out: BTreeMap<String, Vec<SnapshotEntry>> = BTreeMap::new();
        for s in snapshots {
            out.entry(s.metric_type.as_str().to_string())
                .or_default()
                .push(SnapshotEntry {
                    avg_value: s.avg_value,
                    min_value: s.min_value,
                    max_value: s.max_value,
                    low_value: s.low_value,
                    high_value: s.high_value,
                    snapshot_time: s.snapshot_time,
                });
        }
        Ok(out)
    }

    /// Current service set for an agent, busiest first.
    pub async fn services(&self, id: &str) -> Result<Vec<ServiceRecord>, ApiError> {
        self.agents.get(id).await?;
        self.services.get_by_agent(id).await
    }

    /// Running services ranked by weighted resource score.
    pub async fn top_services(&self, id: &str, limit: u32) -> Result<Vec<ServiceRecord>, ApiError> {
        self.agents.get(id).await?;
        self.services.top_by_resource(id, limit).await
    }

    /// Agents not seen for at least `days` days (or never seen).
    pub async fn offline_agents(&self, days: u32) -> Result<Vec<Agent>, ApiError> {
        self.agents.list_offline_since(days).await
    }
}

fn agent_detail(agent: Agent, online: bool, services: Vec<ServiceRecord>) -> AgentDetail {
    AgentDetail {
        id: agent.id,
        agent_id: agent.agent_id,
        hwid: agent.hwid,
        hostname: agent.hostname,
        ip_address: agent.ip_address,
        os_type: agent.os_type,
        os_version: agent.os_version,
        cpu_cores: agent.cpu_cores,
        total_memory_mb: agent.total_memory_mb,
        total_disk_gb: agent.total_disk_gb,
        status: agent.status,
        online,
        last_seen_at: agent.last_seen_at,
        registered_at: agent.registered_at,
        services,
    }
}
