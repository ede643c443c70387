use fleetmon::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
host = "127.0.0.1"
port = 8080

[database]
path = "data/fleet.db"
max_pool_size = 8
raw_retention_days = 3
snapshot_retention_days = 30

[liveness]
online_threshold_secs = 60
offline_days = 5
realtime_window_secs = 300

[rollup]
interval_secs = 60
lookback_windows = 2
vacuum_schedule = "0 3 * * *"
vacuum_interval_secs = 86400
"#;

#[test]
fn valid_config_parses() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.max_pool_size, 8);
    assert_eq!(config.liveness.online_threshold_secs, 60);
    assert_eq!(config.rollup.lookback_windows, 2);
    assert_eq!(config.rollup.vacuum_schedule.as_deref(), Some("0 3 * * *"));
}

#[test]
fn optional_fields_fall_back_to_defaults() {
    let minimal = r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
path = "data/fleet.db"
max_pool_size = 4

[liveness]

[rollup]
interval_secs = 60
"#;
    let config = AppConfig::load_from_str(minimal).unwrap();
    assert_eq!(config.database.raw_retention_days, 3);
    assert_eq!(config.database.snapshot_retention_days, 30);
    assert_eq!(config.liveness.online_threshold_secs, 60);
    assert_eq!(config.liveness.offline_days, 5);
    assert_eq!(config.liveness.realtime_window_secs, 300);
    assert_eq!(config.rollup.lookback_windows, 2);
    assert!(config.rollup.vacuum_schedule.is_none());
    assert_eq!(config.rollup.vacuum_interval_secs, 86_400);
}

#[test]
fn zero_port_is_rejected() {
    let bad = VALID_CONFIG.replace("port = 8080", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn empty_database_path_is_rejected() {
    let bad = VALID_CONFIG.replace("path = \"data/fleet.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn zero_pool_size_is_rejected() {
    let bad = VALID_CONFIG.replace("max_pool_size = 8", "max_pool_size = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.max_pool_size"));
}

#[test]
fn zero_retention_is_rejected() {
    let bad = VALID_CONFIG.replace("raw_retention_days = 3", "raw_retention_days = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());

    let bad = VALID_CONFIG.replace("snapshot_retention_days = 30", "snapshot_retention_days = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn zero_liveness_thresholds_are_rejected() {
    let bad = VALID_CONFIG.replace("online_threshold_secs = 60", "online_threshold_secs = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());

    let bad = VALID_CONFIG.replace("offline_days = 5", "offline_days = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());

    let bad = VALID_CONFIG.replace("realtime_window_secs = 300", "realtime_window_secs = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn zero_rollup_settings_are_rejected() {
    let bad = VALID_CONFIG.replace("interval_secs = 60", "interval_secs = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());

    let bad = VALID_CONFIG.replace("lookback_windows = 2", "lookback_windows = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());

    let bad = VALID_CONFIG.replace("vacuum_interval_secs = 86400", "vacuum_interval_secs = 0");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn missing_section_is_rejected() {
    let bad = VALID_CONFIG.replace("[rollup]", "[rollup_x]");
    assert!(AppConfig::load_from_str(&bad).is_err());
}
