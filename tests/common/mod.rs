// Shared test helpers: repos on a temp SQLite db with a manual clock.

#![allow(dead_code)]

use fleetmon::agent_repo::AgentRepo;
use fleetmon::clock::{Clock, ManualClock};
use fleetmon::ingestor::Ingestor;
use fleetmon::metrics_repo::MetricsRepo;
use fleetmon::models::{RegisterRequest, SamplePayload, ServicePayload};
use fleetmon::query::{LivenessPolicy, QueryFacade};
use fleetmon::service_repo::ServiceRepo;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// Arbitrary fixed "now" for deterministic liveness math.
pub const BASE_MS: i64 = 1_700_000_040_000;

pub struct TestCore {
    // Held so the db file outlives the test.
    _dir: TempDir,
    pub pool: SqlitePool,
    pub clock: Arc<ManualClock>,
    pub agents: Arc<AgentRepo>,
    pub metrics: Arc<MetricsRepo>,
    pub services: Arc<ServiceRepo>,
    pub ingestor: Ingestor,
    pub query: QueryFacade,
}

impl TestCore {
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

pub async fn setup() -> TestCore {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fleet.db");
    let pool = fleetmon::db::connect(path.to_str().unwrap(), 4)
        .await
        .unwrap();

    let clock = Arc::new(ManualClock::new(BASE_MS));
    let clock_dyn: Arc<dyn Clock> = clock.clone();

    let agents = Arc::new(AgentRepo::new(pool.clone(), clock_dyn.clone()));
    let metrics = Arc::new(MetricsRepo::new(pool.clone(), clock_dyn.clone()));
    let services = Arc::new(ServiceRepo::new(pool.clone(), clock_dyn.clone()));
    agents.init().await.unwrap();
    metrics.init().await.unwrap();
    services.init().await.unwrap();

    let ingestor = Ingestor::new(
        agents.clone(),
        metrics.clone(),
        services.clone(),
        clock_dyn.clone(),
    );
    let query = QueryFacade::new(
        agents.clone(),
        metrics.clone(),
        services.clone(),
        clock_dyn,
        LivenessPolicy {
            online_threshold_secs: 60,
            realtime_window_secs: 300,
        },
    );

    TestCore {
        _dir: dir,
        pool,
        clock,
        agents,
        metrics,
        services,
        ingestor,
        query,
    }
}

pub fn register_req(hwid: &str, hostname: &str, token: &str) -> RegisterRequest {
    RegisterRequest {
        agent_id: format!("agent-{}", hwid),
        hwid: hwid.to_string(),
        hostname: hostname.to_string(),
        ip_address: "10.0.0.7".to_string(),
        os_type: "linux".to_string(),
        os_version: "6.8".to_string(),
        cpu_cores: 8,
        total_memory_mb: 16_384,
        total_disk_gb: 512.0,
        api_token: token.to_string(),
    }
}

pub fn sample(metric_type: &str, value: f64) -> SamplePayload {
    SamplePayload {
        metric_type: metric_type.to_string(),
        value,
        unit: None,
        recorded_at: None,
    }
}

pub fn sample_at(metric_type: &str, value: f64, recorded_at: i64) -> SamplePayload {
    SamplePayload {
        metric_type: metric_type.to_string(),
        value,
        unit: Some("%".to_string()),
        recorded_at: Some(recorded_at),
    }
}

pub fn service(name: &str, pid: i64, cpu: f64, mem: f64) -> ServicePayload {
    ServicePayload {
        name: name.to_string(),
        pid,
        status: None,
        cpu_percent: Some(cpu),
        memory_percent: Some(mem),
        memory_mb: Some(128),
        disk_read_mb: None,
        disk_write_mb: None,
        user: Some("root".to_string()),
        command: Some(format!("/usr/bin/{}", name)),
    }
}
