// Background rollup worker: sweep recently closed windows into snapshots for
// every period, then prune raw samples and old snapshots.
// Runs every interval_secs. VACUUM runs on a configurable schedule (cron
// expression or fixed interval). Concurrent sweeps over the same window are
// safe because snapshot writes are keyed upserts.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::metrics_repo::MetricsRepo;
use crate::metrics_repo::rollup;
use crate::models::SnapshotPeriod;
use tracing::{info, instrument, warn};

/// Config for the rollup worker.
#[derive(Debug, Clone)]
pub struct RollupWorkerConfig {
    pub interval_secs: u64,
    /// How many closed windows back each sweep covers, per period. Late
    /// samples inside the lookback are picked up by the next sweep's upsert.
    pub lookback_windows: u32,
    pub raw_retention_days: u32,
    pub snapshot_retention_days: u32,
    /// Optional cron expression for VACUUM (e.g. "0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

/// Spawns the rollup worker. Returns a join handle.
pub fn spawn(
    repo: Arc<MetricsRepo>,
    clock: Arc<dyn Clock>,
    config: RollupWorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(repo, clock, config).await;
    })
}

#[instrument(skip(repo, clock), fields(interval_secs = config.interval_secs))]
async fn run(repo: Arc<MetricsRepo>, clock: Arc<dyn Clock>, config: RollupWorkerConfig) {
    let mut sweep_interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let (vacuum_tx, mut vacuum_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(vacuum_scheduler(config.clone(), vacuum_tx));

    loop {
        tokio::select! {
            _ = sweep_interval.tick() => {
                let now_ms = clock.now_ms();
                if let Err(e) = run_one_sweep(&repo, &config, now_ms).await {
                    warn!(error = %e, "rollup sweep failed");
                }
            }
            _ = vacuum_rx.recv() => {
                if let Err(e) = repo.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                } else {
                    info!("vacuum complete");
                }
            }
        }
    }
}

/// Sends a message on `tx` at each VACUUM time (cron or fixed interval). Uses local time for cron.
async fn vacuum_scheduler(config: RollupWorkerConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.vacuum_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid vacuum_schedule; VACUUM will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.vacuum_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Runs one sweep over the last `lookback_windows` closed windows of every
/// period, then prunes. Upserts make re-running over the same windows
/// idempotent. Returns the number of snapshots written.
pub async fn run_one_sweep(
    repo: &MetricsRepo,
    config: &RollupWorkerConfig,
    now_ms: i64,
) -> anyhow::Result<u32> {
    let mut written: u32 = 0;

    for period in SnapshotPeriod::ALL {
        let period_ms = period.duration_ms();
        // End of the most recent closed window.
        let closed_end = rollup::window_start(now_ms, period);

        for k in 1..=(config.lookback_windows as i64) {
            let start = closed_end - k * period_ms;
            if start < 0 {
                break;
            }
            let end = start + period_ms;
            let samples = repo.samples_in_window(start, end).await?;
            for snapshot in rollup::rollup_window(&samples, start, period) {
                repo.upsert_snapshot(&snapshot).await?;
                written += 1;
            }
        }
    }

    if written > 0 {
        info!(snapshots_written = written, "rollup sweep");
    }

    let raw_cutoff = now_ms - (config.raw_retention_days as i64) * 86_400_000;
    let pruned_raw = repo.prune_raw_before(raw_cutoff).await?;
    let snapshot_cutoff = now_ms - (config.snapshot_retention_days as i64) * 86_400_000;
    let pruned_snapshots = repo.prune_snapshots_before(snapshot_cutoff).await?;
    if pruned_raw > 0 || pruned_snapshots > 0 {
        info!(pruned_raw, pruned_snapshots, "retention prune");
    }

    Ok(written)
}
