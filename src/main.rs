use anyhow::Result;
use fleetmon::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let clock: Arc<dyn clock::Clock> = Arc::new(clock::SystemClock);

    let pool = db::connect(&app_config.database.path, app_config.database.max_pool_size).await?;
    let agents = Arc::new(agent_repo::AgentRepo::new(pool.clone(), clock.clone()));
    let metrics = Arc::new(metrics_repo::MetricsRepo::new(pool.clone(), clock.clone()));
    let services = Arc::new(service_repo::ServiceRepo::new(pool.clone(), clock.clone()));
    agents.init().await?;
    metrics.init().await?;
    services.init().await?;

    let ingestor = Arc::new(ingestor::Ingestor::new(
        agents.clone(),
        metrics.clone(),
        services.clone(),
        clock.clone(),
    ));
    let query = Arc::new(query::QueryFacade::new(
        agents.clone(),
        metrics.clone(),
        services.clone(),
        clock.clone(),
        query::LivenessPolicy {
            online_threshold_secs: app_config.liveness.online_threshold_secs,
            realtime_window_secs: app_config.liveness.realtime_window_secs,
        },
    ));

    let worker_handle = rollup_worker::spawn(
        metrics.clone(),
        clock.clone(),
        rollup_worker::RollupWorkerConfig {
            interval_secs: app_config.rollup.interval_secs,
            lookback_windows: app_config.rollup.lookback_windows,
            raw_retention_days: app_config.database.raw_retention_days,
            snapshot_retention_days: app_config.database.snapshot_retention_days,
            vacuum_schedule: app_config.rollup.vacuum_schedule.clone(),
            vacuum_interval_secs: app_config.rollup.vacuum_interval_secs,
        },
    );

    let app = routes::app(agents, ingestor, query, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    tokio::signal::ctrl_c().await
                }
            } => {
                tracing::info!("Received shutdown signal");
                worker_handle.abort();
            }
        }
    }

    Ok(())
}
