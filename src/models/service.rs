// Process-table (service) snapshot models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ServiceStatus::Running),
            "stopped" => Some(ServiceStatus::Stopped),
            _ => None,
        }
    }
}

/// A point-in-time observation of one process on an agent. The stored set
/// per agent is only the most recent submission (full-replace semantics).
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub agent_id: String,
    pub name: String,
    pub pid: i64,
    pub status: ServiceStatus,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: i64,
    pub disk_read_mb: f64,
    pub disk_write_mb: f64,
    pub user: String,
    pub command: Option<String>,
    pub recorded_at: i64,
}

/// One process entry as submitted by an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicePayload {
    pub name: String,
    pub pid: i64,
    pub status: Option<String>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub memory_mb: Option<i64>,
    pub disk_read_mb: Option<f64>,
    pub disk_write_mb: Option<f64>,
    pub user: Option<String>,
    pub command: Option<String>,
}

/// A validated process entry ready for insert.
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub pid: i64,
    pub status: ServiceStatus,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: i64,
    pub disk_read_mb: f64,
    pub disk_write_mb: f64,
    pub user: String,
    pub command: Option<String>,
}
