use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub liveness: LivenessConfig,
    pub rollup: RollupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    #[serde(default = "default_raw_retention_days")]
    pub raw_retention_days: u32,
    #[serde(default = "default_snapshot_retention_days")]
    pub snapshot_retention_days: u32,
}

fn default_raw_retention_days() -> u32 {
    3
}

fn default_snapshot_retention_days() -> u32 {
    30
}

/// Read-time liveness thresholds. `status` stays whatever the agent last
/// reported; these only affect the derived views.
#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_online_threshold_secs")]
    pub online_threshold_secs: u64,
    /// Default horizon for the offline-candidates listing.
    #[serde(default = "default_offline_days")]
    pub offline_days: u32,
    /// Samples older than this are not "realtime" anymore.
    #[serde(default = "default_realtime_window_secs")]
    pub realtime_window_secs: u64,
}

fn default_online_threshold_secs() -> u64 {
    60
}

fn default_offline_days() -> u32 {
    5
}

fn default_realtime_window_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupConfig {
    pub interval_secs: u64,
    #[serde(default = "default_lookback_windows")]
    pub lookback_windows: u32,
    /// Optional cron expression for VACUUM (local time). Falls back to
    /// vacuum_interval_secs when unset.
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_lookback_windows() -> u32 {
    2
}

fn default_vacuum_interval_secs() -> u64 {
    86_400
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            self.database.raw_retention_days > 0,
            "database.raw_retention_days must be > 0, got {}",
            self.database.raw_retention_days
        );
        anyhow::ensure!(
            self.database.snapshot_retention_days > 0,
            "database.snapshot_retention_days must be > 0, got {}",
            self.database.snapshot_retention_days
        );
        anyhow::ensure!(
            self.liveness.online_threshold_secs > 0,
            "liveness.online_threshold_secs must be > 0, got {}",
            self.liveness.online_threshold_secs
        );
        anyhow::ensure!(
            self.liveness.offline_days > 0,
            "liveness.offline_days must be > 0, got {}",
            self.liveness.offline_days
        );
        anyhow::ensure!(
            self.liveness.realtime_window_secs > 0,
            "liveness.realtime_window_secs must be > 0, got {}",
            self.liveness.realtime_window_secs
        );
        anyhow::ensure!(
            self.rollup.interval_secs > 0,
            "rollup.interval_secs must be > 0, got {}",
            self.rollup.interval_secs
        );
        anyhow::ensure!(
            self.rollup.lookback_windows > 0,
            "rollup.lookback_windows must be > 0, got {}",
            self.rollup.lookback_windows
        );
        anyhow::ensure!(
            self.rollup.vacuum_interval_secs > 0,
            "rollup.vacuum_interval_secs must be > 0, got {}",
            self.rollup.vacuum_interval_secs
        );
        Ok(())
    }
}
