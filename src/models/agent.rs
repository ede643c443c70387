// Agent identity and liveness derivation

use serde::{Deserialize, Serialize};

/// Agent-reported health flag. Liveness as seen by readers is derived from
/// `last_seen_at` freshness, not from this field; the two can disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(AgentStatus::Online),
            "offline" => Some(AgentStatus::Offline),
            "error" => Some(AgentStatus::Error),
            _ => None,
        }
    }
}

/// One monitored host. Timestamps are epoch milliseconds; `last_seen_at` is
/// None until the first heartbeat or registration sets it.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub hwid: String,
    pub agent_id: String,
    pub hostname: String,
    pub ip_address: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub os_type: String,
    pub os_version: String,
    pub cpu_cores: i64,
    pub total_memory_mb: i64,
    pub total_disk_gb: f64,
    pub status: AgentStatus,
    pub last_seen_at: Option<i64>,
    pub registered_at: i64,
    #[serde(skip_serializing)]
    pub deleted_at: Option<i64>,
}

impl Agent {
    /// Online iff the agent reports online AND the last heartbeat is fresh.
    pub fn is_online(&self, now_ms: i64, threshold_secs: u64) -> bool {
        self.status == AgentStatus::Online
            && self
                .last_seen_at
                .is_some_and(|ts| now_ms - ts < (threshold_secs as i64) * 1000)
    }
}

/// Registration payload from an agent (POST /api/agent/register).
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub hwid: String,
    pub hostname: String,
    pub ip_address: String,
    pub os_type: String,
    pub os_version: String,
    pub cpu_cores: i64,
    pub total_memory_mb: i64,
    pub total_disk_gb: f64,
    pub api_token: String,
}

/// What `register` did with the hwid's uniqueness slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Updated,
    Restored,
}
