// Service (process-table) records. Each submission fully replaces the
// agent's prior set inside one transaction, so readers see all-old or
// all-new, never a mix.

use crate::clock::Clock;
use crate::error::ApiError;
use crate::models::{NewService, ServiceRecord, ServiceStatus};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::sync::Arc;
use tracing::instrument;

pub struct ServiceRepo {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl ServiceRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                name TEXT NOT NULL,
                pid INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'running',
                cpu_percent REAL NOT NULL DEFAULT 0,
                memory_percent REAL NOT NULL DEFAULT 0,
                memory_mb INTEGER NOT NULL DEFAULT 0,
                disk_read_mb REAL NOT NULL DEFAULT 0,
                disk_write_mb REAL NOT NULL DEFAULT 0,
                user TEXT NOT NULL,
                command TEXT,
                recorded_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_services_agent_status ON services(agent_id, status)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_services_agent_time ON services(agent_id, recorded_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete-then-insert in one transaction (full-replace semantics).
    #[instrument(skip(self, services), fields(repo = "services", operation = "replace_for_agent", services_count = services.len()))]
    pub async fn replace_for_agent(
        &self,
        agent_id: &str,
        services: &[NewService],
    ) -> Result<(), ApiError> {
        let now = self.clock.now_ms();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM services WHERE agent_id = $1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        for s in services {
            sqlx::query(
                "INSERT INTO services (agent_id, name, pid, status, cpu_percent, memory_percent,
                 memory_mb, disk_read_mb, disk_write_mb, user, command, recorded_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(agent_id)
            .bind(&s.name)
            .bind(s.pid)
            .bind(s.status.as_str())
            .bind(s.cpu_percent)
            .bind(s.memory_percent)
            .bind(s.memory_mb)
            .bind(s.disk_read_mb)
            .bind(s.disk_write_mb)
            .bind(&s.user)
            .bind(&s.command)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Current set for an agent, busiest first.
    pub async fn get_by_agent(&self, agent_id: &str) -> Result<Vec<ServiceRecord>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM services WHERE agent_id = $1 ORDER BY cpu_percent DESC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        parse_service_rows(rows)
    }

    /// Most recently captured records, for the agent detail view.
    pub async fn recent_for_agent(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<ServiceRecord>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM services WHERE agent_id = $1 ORDER BY recorded_at DESC LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        parse_service_rows(rows)
    }

    /// Running services ranked by weighted resource score
    /// (0.6 x cpu% + 0.4 x mem%).
    #[instrument(skip(self), fields(repo = "services", operation = "top_by_resource"))]
    pub async fn top_by_resource(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<ServiceRecord>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM services
             WHERE agent_id = $1 AND status = 'running'
             ORDER BY (cpu_percent * 0.6) + (memory_percent * 0.4) DESC
             LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        parse_service_rows(rows)
    }
}

fn parse_service_rows(rows: Vec<SqliteRow>) -> Result<Vec<ServiceRecord>, ApiError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(parse_service_row(&row)?);
    }
    Ok(out)
}

fn parse_service_row(row: &SqliteRow) -> Result<ServiceRecord, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = ServiceStatus::parse(&status_str).unwrap_or_else(|| {
        tracing::debug!(status = %status_str, "unknown service status in store, treating as stopped");
        ServiceStatus::Stopped
    });
    Ok(ServiceRecord {
        agent_id: row.try_get("agent_id")?,
        name: row.try_get("name")?,
        pid: row.try_get("pid")?,
        status,
        cpu_percent: row.try_get("cpu_percent")?,
        memory_percent: row.try_get("memory_percent")?,
        memory_mb: row.try_get("memory_mb")?,
        disk_read_mb: row.try_get("disk_read_mb")?,
        disk_write_mb: row.try_get("disk_write_mb")?,
        user: row.try_get("user")?,
        command: row.try_get("command")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}
