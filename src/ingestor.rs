// Ingestion path for authenticated agents: validate, then persist.
// Validation is whole-batch: the first bad sample rejects everything and
// zero rows are written.

use crate::agent_repo::AgentRepo;
use crate::clock::Clock;
use crate::error::ApiError;
use crate::metrics_repo::MetricsRepo;
use crate::models::{MetricType, NewSample, NewService, SamplePayload, ServicePayload, ServiceStatus};
use crate::service_repo::ServiceRepo;
use std::sync::Arc;
use tracing::instrument;

pub struct Ingestor {
    agents: Arc<AgentRepo>,
    metrics: Arc<MetricsRepo>,
    services: Arc<ServiceRepo>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(
        agents: Arc<AgentRepo>,
        metrics: Arc<MetricsRepo>,
        services: Arc<ServiceRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            agents,
            metrics,
            services,
            clock,
        }
    }

    /// Stores a metric batch for the agent the token resolves to. Returns the
    /// number of stored samples. A recorded_at omitted by the agent defaults
    /// to ingestion time.
    #[instrument(skip(self, token, samples), fields(component = "ingestor", samples_count = samples.len()))]
    pub async fn ingest_metrics(
        &self,
        token: &str,
        samples: &[SamplePayload],
    ) -> Result<usize, ApiError> {
        let agent = self.agents.find_by_token(token).await?;
        if samples.is_empty() {
            return Err(ApiError::InvalidInput("metrics batch is empty".into()));
        }

        let now = self.clock.now_ms();
        let mut rows = Vec::with_capacity(samples.len());
        for (i, s) in samples.iter().enumerate() {
            let Some(metric_type) = MetricType::parse(&s.metric_type) else {
                return Err(ApiError::InvalidInput(format!(
                    "sample {}: unknown metric type '{}'",
                    i, s.metric_type
                )));
            };
            if !s.value.is_finite() || s.value < 0.0 {
                return Err(ApiError::InvalidInput(format!(
                    "sample {}: value must be a non-negative number, got {}",
                    i, s.value
                )));
            }
            rows.push(NewSample {
                metric_type,
                value: s.value,
                unit: s.unit.clone().unwrap_or_else(|| "%".to_string()),
                recorded_at: s.recorded_at.unwrap_or(now),
            });
        }

        self.metrics.insert_samples(&agent.id, &rows).await?;
        Ok(rows.len())
    }

    /// Replaces the agent's entire service set. Returns the new set's size.
    #[instrument(skip(self, token, services), fields(component = "ingestor", services_count = services.len()))]
    pub async fn ingest_services(
        &self,
        token: &str,
        services: &[ServicePayload],
    ) -> Result<usize, ApiError> {
        let agent = self.agents.find_by_token(token).await?;

        let mut rows = Vec::with_capacity(services.len());
        for (i, s) in services.iter().enumerate() {
            if s.name.is_empty() {
                return Err(ApiError::InvalidInput(format!(
                    "service {}: name must be non-empty",
                    i
                )));
            }
            if s.pid < 0 {
                return Err(ApiError::InvalidInput(format!(
                    "service {}: pid must be non-negative, got {}",
                    i, s.pid
                )));
            }
            let status = match &s.status {
                Some(raw) => ServiceStatus::parse(raw).ok_or_else(|| {
                    ApiError::InvalidInput(format!("service {}: unknown status '{}'", i, raw))
                })?,
                None => ServiceStatus::Running,
            };
            rows.push(NewService {
                name: s.name.clone(),
                pid: s.pid,
                status,
                cpu_percent: s.cpu_percent.unwrap_or(0.0),
                memory_percent: s.memory_percent.unwrap_or(0.0),
                memory_mb: s.memory_mb.unwrap_or(0),
                disk_read_mb: s.disk_read_mb.unwrap_or(0.0),
                disk_write_mb: s.disk_write_mb.unwrap_or(0.0),
                user: s.user.clone().unwrap_or_else(|| "unknown".to_string()),
                command: s.command.clone(),
            });
        }

        self.services.replace_for_agent(&agent.id, &rows).await?;
        // A service push is a liveness signal too.
        self.agents.heartbeat(token).await?;
        Ok(rows.len())
    }
}
