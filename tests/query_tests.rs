// Read-side tests: fleet listing counts, realtime freshness, history
// statistics, snapshot views, top services.

mod common;

use common::{register_req, sample_at, service, setup, BASE_MS};
use fleetmon::error::ApiError;
use fleetmon::models::{MetricType, SnapshotPeriod};
use fleetmon::rollup_worker::{run_one_sweep, RollupWorkerConfig};

#[tokio::test]
async fn fleet_summary_counts_derived_liveness() {
    let core = setup().await;
    core.agents
        .register(&register_req("hw-a", "host-a", "tok-a"))
        .await
        .unwrap();
    let (_, b) = core
        .agents
        .register(&register_req("hw-b", "host-b", "tok-b"))
        .await
        .unwrap();
    let (_, c) = core
        .agents
        .register(&register_req("hw-c", "host-c", "tok-c"))
        .await
        .unwrap();

    // b last seen 90s ago (stale), c flagged error and stale
    core.clock.advance_secs(90);
    core.agents.heartbeat("tok-a").await.unwrap();
    sqlx::query("UPDATE agents SET status = 'error' WHERE id = $1")
        .bind(&c.id)
        .execute(&core.pool)
        .await
        .unwrap();

    let (summaries, summary) = core.query.list_agents().await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.online, 1);
    assert_eq!(summary.offline, 1);
    assert_eq!(summary.error, 1);

    let b_row = summaries.iter().find(|s| s.id == b.id).unwrap();
    assert!(!b_row.online);
}

#[tokio::test]
async fn agent_summary_includes_service_count() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();
    core.ingestor
        .ingest_services(
            "tok-1",
            &[service("nginx", 100, 2.0, 1.0), service("redis", 200, 1.0, 2.0)],
        )
        .await
        .unwrap();

    let (summaries, _) = core.query.list_agents().await.unwrap();
    let row = summaries.iter().find(|s| s.id == agent.id).unwrap();
    assert_eq!(row.service_count, 2);
}

#[tokio::test]
async fn agent_detail_carries_recent_services() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();
    core.ingestor
        .ingest_services("tok-1", &[service("nginx", 100, 2.0, 1.0)])
        .await
        .unwrap();

    let detail = core.query.get_agent(&agent.id).await.unwrap();
    assert_eq!(detail.hwid, "hw-1");
    assert!(detail.online);
    assert_eq!(detail.services.len(), 1);

    let err = core.query.get_agent("no-such-id").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn realtime_returns_latest_per_type_and_omits_stale() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();

    let now = core.now_ms();
    core.ingestor
        .ingest_metrics(
            "tok-1",
            &[
                sample_at("cpu", 10.0, now - 120_000),
                sample_at("cpu", 35.0, now - 20_000),
                // beyond the 300s realtime window: omitted, not zero-filled
                sample_at("memory", 50.0, now - 400_000),
            ],
        )
        .await
        .unwrap();

    let realtime = core.query.realtime(&agent.id).await.unwrap();
    assert_eq!(realtime.len(), 1);
    let cpu = &realtime["cpu"];
    assert_eq!(cpu.value, 35.0);
    assert_eq!(cpu.recorded_at, now - 20_000);
    assert!(!realtime.contains_key("memory"));
}

#[tokio::test]
async fn history_recomputes_stats_from_raw_samples() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();

    let now = core.now_ms();
    core.ingestor
        .ingest_metrics(
            "tok-1",
            &[
                sample_at("cpu", 10.0, now - 50 * 60_000),
                sample_at("cpu", 30.0, now - 30 * 60_000),
                sample_at("cpu", 20.0, now - 10 * 60_000),
                sample_at("memory", 70.0, now - 5 * 60_000),
                // outside the one-hour window
                sample_at("cpu", 99.0, now - 2 * 3_600_000),
            ],
        )
        .await
        .unwrap();

    let history = core.query.history(&agent.id, 1, None).await.unwrap();
    assert_eq!(history.len(), 2);

    let cpu = &history["cpu"];
    assert_eq!(cpu.history.len(), 3);
    assert_eq!(cpu.min, 10.0);
    assert_eq!(cpu.max, 30.0);
    assert_eq!(cpu.avg, 20.0);
    // current is the most recent sample, not the largest
    assert_eq!(cpu.current, 20.0);

    let filtered = core
        .query
        .history(&agent.id, 1, Some(MetricType::Memory))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert!(filtered.contains_key("memory"));
}

#[tokio::test]
async fn snapshot_view_groups_by_type_ascending() {
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
                sample_at("cpu", 10.0, BASE_MS - 110_000),
                sample_at("cpu", 20.0, BASE_MS - 100_000),
                sample_at("cpu", 40.0, BASE_MS - 30_000),
            ],
        )
        .await
        .unwrap();
    let config = RollupWorkerConfig {
        interval_secs: 60,
        lookback_windows: 2,
        raw_retention_days: 3,
        snapshot_retention_days: 30,
        vacuum_schedule: None,
        vacuum_interval_secs: 86_400,
    };
    run_one_sweep(&core.metrics, &config, BASE_MS).await.unwrap();

    let view = core
        .query
        .snapshots(&agent.id, SnapshotPeriod::OneMin, 24, None)
        .await
        .unwrap();
    let cpu = &view["cpu"];
    assert_eq!(cpu.len(), 2);
    assert!(cpu[0].snapshot_time < cpu[1].snapshot_time);
    assert_eq!(cpu[0].avg_value, 15.0);
    assert_eq!(cpu[1].avg_value, 40.0);
}

#[tokio::test]
async fn top_services_rank_by_weighted_score_and_skip_stopped() {
    let core = setup().await;
    let (_, agent) = core
        .agents
        .register(&register_req("hw-1", "alpha", "tok-1"))
        .await
        .unwrap();

    // a: 50*0.6 + 10*0.4 = 34, b: 10*0.6 + 90*0.4 = 42
    let mut stopped = service("halted", 300, 99.0, 99.0);
    stopped.status = Some("stopped".to_string());
    core.ingestor
        .ingest_services(
            "tok-1",
            &[
                service("svc-a", 100, 50.0, 10.0),
                service("svc-b", 200, 10.0, 90.0),
                stopped,
            ],
        )
        .await
        .unwrap();

    let top = core.query.top_services(&agent.id, 10).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].name, "svc-b");
    assert_eq!(top[1].name, "svc-a");

    let top_one = core.query.top_services(&agent.id, 1).await.unwrap();
    assert_eq!(top_one.len(), 1);
    assert_eq!(top_one[0].name, "svc-b");
}

#[tokio::test]
async fn reads_for_unknown_agent_are_not_found() {
    let core = setup().await;
    assert!(matches!(
        core.query.realtime("missing").await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        core.query.history("missing", 1, None).await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        core.query
            .snapshots("missing", SnapshotPeriod::OneMin, 24, None)
            .await,
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        core.query.services("missing").await,
        Err(ApiError::NotFound(_))
    ));
}
