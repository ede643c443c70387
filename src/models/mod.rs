// Domain models

mod agent;
mod metric;
mod service;
mod snapshot;

pub use agent::{Agent, AgentStatus, RegisterOutcome, RegisterRequest};
pub use metric::{MetricSample, MetricType, NewSample, SamplePayload};
pub use service::{NewService, ServicePayload, ServiceRecord, ServiceStatus};
pub use snapshot::{MetricSnapshot, SnapshotPeriod};
