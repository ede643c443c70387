// Window statistics and the sweep worker: percentile rule, idempotent
// upserts, late samples, retention pruning.

mod common;

use common::{register_req, sample_at, setup, BASE_MS};
use fleetmon::metrics_repo::rollup::{compute_window_stats, rollup_window, window_start};
use fleetmon::models::{MetricSnapshot, MetricType, SnapshotPeriod};
use fleetmon::rollup_worker::{run_one_sweep, RollupWorkerConfig};

fn worker_config() -> RollupWorkerConfig {
    RollupWorkerConfig {
        interval_secs: 60,
        lookback_windows: 2,
        raw_retention_days: 3,
        snapshot_retention_days: 30,
        vacuum_schedule: None,
        vacuum_interval_secs: 86_400,
    }
}

#[test]
fn window_start_floors_to_period_boundary() {
    assert_eq!(window_start(1_700_000_099_999, SnapshotPeriod::OneMin), 1_700_000_040_000);
    assert_eq!(window_start(1_700_000_040_000, SnapshotPeriod::OneMin), 1_700_000_040_000);
    assert_eq!(window_start(1_700_000_040_000, SnapshotPeriod::OneHour), 1_699_999_200_000);
    assert_eq!(window_start(1_700_000_040_000, SnapshotPeriod::OneDay), 1_699_920_000_000);
}

#[test]
fn stats_use_floored_quartile_indexes() {
    let stats = compute_window_stats(&[40.0, 10.0, 30.0, 20.0]).unwrap();
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 40.0);
    assert_eq!(stats.avg, 25.0);
    // n=4: low index floor(1.0)=1, high index floor(3.0)=3
    assert_eq!(stats.low, 20.0);
    assert_eq!(stats.high, 40.0);
}

#[test]
fn stats_for_single_sample_collapse_to_that_value() {
    let stats = compute_window_stats(&[7.5]).unwrap();
    assert_eq!(stats.avg, 7.5);
    assert_eq!(stats.min, 7.5);
    assert_eq!(stats.max, 7.5);
    assert_eq!(stats.low, 7.5);
    assert_eq!(stats.high, 7.5);
}

#[test]
fn stats_for_empty_window_are_none() {
    assert!(compute_window_stats(&[]).is_none());
}

#[test]
fn rollup_window_groups_per_agent_and_type() {
    let samples = vec![
        ("a".to_string(), MetricType::Cpu, 10.0),
        ("a".to_string(), MetricType::Cpu, 20.0),
        ("a".to_string(), MetricType::Memory, 50.0),
        ("b".to_string(), MetricType::Cpu, 90.0),
    ];
    let out = rollup_window(&samples, 1_700_000_040_000, SnapshotPeriod::OneMin);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].agent_id, "a");
    assert_eq!(out[0].metric_type, MetricType::Cpu);
    assert_eq!(out[0].avg_value, 15.0);
    assert_eq!(out[1].metric_type, MetricType::Memory);
    assert_eq!(out[2].agent_id, "b");
    assert!(out.iter().all(|s| s.snapshot_time == 1_700_000_040_000));
}

#[tokio::test]
async fn sweep_rolls_closed_minute_window() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();

    // All four land in the closed window [BASE_MS-60s, BASE_MS)
    core.ingestor
        .ingest_metrics(
            "tok-1",
            &[
                sample_at("cpu", 10.0, BASE_MS - 50_000),
                sample_at("cpu", 20.0, BASE_MS - 45_000),
                sample_at("cpu", 30.0, BASE_MS - 40_000),
                sample_at("cpu", 40.0, BASE_MS - 35_000),
            ],
        )
        .await
        .unwrap();

    let written = run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();
    assert_eq!(written, 1);

    let snapshots = core
        .metrics
        .snapshots_since(&agent.id, SnapshotPeriod::OneMin, 0, None)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    let s = &snapshots[0];
    assert_eq!(s.snapshot_time, BASE_MS - 60_000);
    assert_eq!(s.avg_value, 25.0);
    assert_eq!(s.min_value, 10.0);
    assert_eq!(s.max_value, 40.0);
    assert_eq!(s.low_value, 20.0);
    assert_eq!(s.high_value, 40.0);
}

#[tokio::test]
async fn sweep_is_idempotent_over_the_same_window() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();
    core.ingestor
        .ingest_metrics(
            "tok-1",
            &[
                sample_at("cpu", 10.0, BASE_MS - 50_000),
                sample_at("cpu", 30.0, BASE_MS - 40_000),
            ],
        )
        .await
        .unwrap();

    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();
    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();

    let snapshots = core
        .metrics
        .snapshots_since(&agent.id, SnapshotPeriod::OneMin, 0, None)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].avg_value, 20.0);
}

#[tokio::test]
async fn late_sample_within_lookback_updates_the_snapshot() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();
    core.ingestor
        .ingest_metrics("tok-1", &[sample_at("cpu", 10.0, BASE_MS - 50_000)])
        .await
        .unwrap();
    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();

    // Arrives after the first sweep but belongs to the same closed window
    core.ingestor
        .ingest_metrics("tok-1", &[sample_at("cpu", 30.0, BASE_MS - 10_000)])
        .await
        .unwrap();
    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();

    let snapshots = core
        .metrics
        .snapshots_since(&agent.id, SnapshotPeriod::OneMin, 0, None)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].avg_value, 20.0);
    assert_eq!(snapshots[0].max_value, 30.0);
}

#[tokio::test]
async fn sweep_with_no_samples_writes_nothing() {
    let core = setup().await;
    let written = run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn sweep_prunes_raw_samples_past_retention() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();
    core.ingestor
        .ingest_metrics(
            "tok-1",
            &[
                sample_at("cpu", 5.0, BASE_MS - 4 * 86_400_000),
                sample_at("cpu", 15.0, BASE_MS - 50_000),
            ],
        )
        .await
        .unwrap();

    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();

    let raw = core
        .metrics
        .samples_since(&agent.id, 0, None)
        .await
        .unwrap();
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].value, 15.0);
}

#[tokio::test]
async fn sweep_prunes_snapshots_past_retention() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();

    core.metrics
        .upsert_snapshot(&MetricSnapshot {
            agent_id: agent.id.clone(),
            metric_type: MetricType::Cpu,
            avg_value: 1.0,
            min_value: 1.0,
            max_value: 1.0,
            low_value: 1.0,
            high_value: 1.0,
            snapshot_period: SnapshotPeriod::OneDay,
            snapshot_time: BASE_MS - 40 * 86_400_000,
        })
        .await
        .unwrap();

    run_one_sweep(&core.metrics, &worker_config(), BASE_MS)
        .await
        .unwrap();

    let snapshots = core
        .metrics
        .snapshots_since(&agent.id, SnapshotPeriod::OneDay, 0, None)
        .await
        .unwrap();
    assert!(snapshots.is_empty());
}
