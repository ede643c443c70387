// Agent registry: identity, dedup-by-hwid, soft delete/restore, heartbeats.
// One non-deleted row per hwid; a soft-deleted row keeps its uniqueness slot
// and is restored on re-registration instead of re-created.

use crate::clock::Clock;
use crate::error::ApiError;
use crate::models::{Agent, AgentStatus, RegisterOutcome, RegisterRequest};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::sync::Arc;
use tracing::instrument;

pub struct AgentRepo {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AgentRepo {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                hwid TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                hostname TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                api_token TEXT NOT NULL,
                os_type TEXT NOT NULL,
                os_version TEXT NOT NULL,
                cpu_cores INTEGER NOT NULL,
                total_memory_mb INTEGER NOT NULL,
                total_disk_gb REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'offline',
                last_seen_at INTEGER,
                registered_at INTEGER NOT NULL,
                deleted_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_hwid ON agents(hwid)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_agent_id ON agents(agent_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_api_token ON agents(api_token)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_agents_last_seen_at ON agents(last_seen_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Registers an agent, deduplicating by hwid (soft-deleted rows included).
    /// Soft-deleted: restore + refresh connection attributes. Active: refresh
    /// connection attributes and last_seen_at; the stored credential is kept.
    /// Absent: insert. The insert carries ON CONFLICT(hwid) DO UPDATE, so two
    /// concurrent first registrations from one machine collapse into one row.
    #[instrument(skip(self, req), fields(repo = "agents", operation = "register", hwid = %req.hwid))]
    pub async fn register(
        &self,
        req: &RegisterRequest,
    ) -> Result<(RegisterOutcome, Agent), ApiError> {
        let now = self.clock.now_ms();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id, deleted_at FROM agents WHERE hwid = $1")
            .bind(&req.hwid)
            .fetch_optional(&mut *tx)
            .await?;

        let (outcome, id) = match existing {
            Some(row) => {
                let id: String = row.try_get("id")?;
                let deleted_at: Option<i64> = row.try_get("deleted_at")?;
                sqlx::query(
                    "UPDATE agents SET hostname = $1, ip_address = $2, os_type = $3,
                     os_version = $4, cpu_cores = $5, total_memory_mb = $6, total_disk_gb = $7,
                     status = 'online', last_seen_at = $8, deleted_at = NULL
                     WHERE id = $9",
                )
                .bind(&req.hostname)
                .bind(&req.ip_address)
                .bind(&req.os_type)
                .bind(&req.os_version)
                .bind(req.cpu_cores)
                .bind(req.total_memory_mb)
                .bind(req.total_disk_gb)
                .bind(now)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
                let outcome = if deleted_at.is_some() {
                    RegisterOutcome::Restored
                } else {
                    RegisterOutcome::Updated
                };
                (outcome, id)
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let row = sqlx::query(
                    "INSERT INTO agents (id, hwid, agent_id, hostname, ip_address, api_token,
                     os_type, os_version, cpu_cores, total_memory_mb, total_disk_gb,
                     status, last_seen_at, registered_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'online', $12, $12)
                     ON CONFLICT(hwid) DO UPDATE SET
                        hostname = excluded.hostname,
                        ip_address = excluded.ip_address,
                        os_type = excluded.os_type,
                        os_version = excluded.os_version,
                        cpu_cores = excluded.cpu_cores,
                        total_memory_mb = excluded.total_memory_mb,
                        total_disk_gb = excluded.total_disk_gb,
                        status = 'online',
                        last_seen_at = excluded.last_seen_at,
                        deleted_at = NULL
                     RETURNING id",
                )
                .bind(&id)
                .bind(&req.hwid)
                .bind(&req.agent_id)
                .bind(&req.hostname)
                .bind(&req.ip_address)
                .bind(&req.api_token)
                .bind(&req.os_type)
                .bind(&req.os_version)
                .bind(req.cpu_cores)
                .bind(req.total_memory_mb)
                .bind(req.total_disk_gb)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_unique_violation)?;
                let won_id: String = row.try_get("id")?;
                let outcome = if won_id == id {
                    RegisterOutcome::Created
                } else {
                    // Another registration with the same hwid won the race.
                    RegisterOutcome::Updated
                };
                (outcome, won_id)
            }
        };

        let agent = fetch_agent_any(&mut *tx, &id).await?;
        tx.commit().await?;
        Ok((outcome, agent))
    }

    /// One atomic last-writer-wins update; no read-modify-write, so concurrent
    /// heartbeats from the same agent cannot race.
    #[instrument(skip(self, token), fields(repo = "agents", operation = "heartbeat"))]
    pub async fn heartbeat(&self, token: &str) -> Result<(), ApiError> {
        let now = self.clock.now_ms();
        let r = sqlx::query(
            "UPDATE agents SET status = 'online', last_seen_at = $1
             WHERE api_token = $2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(token)
        .execute(&self.pool)
        .await?;
        if r.rows_affected() == 0 {
            return Err(ApiError::Unauthenticated);
        }
        Ok(())
    }

    /// Resolves a live agent by its bearer credential.
    pub async fn find_by_token(&self, token: &str) -> Result<Agent, ApiError> {
        let row = sqlx::query("SELECT * FROM agents WHERE api_token = $1 AND deleted_at IS NULL")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(parse_agent_row(&row)?),
            None => Err(ApiError::Unauthenticated),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Agent, ApiError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(parse_agent_row(&row)?),
            None => Err(ApiError::NotFound("agent".into())),
        }
    }

    /// All non-deleted agents with their current service count, ordered by
    /// status then hostname.
    #[instrument(skip(self), fields(repo = "agents", operation = "list"))]
    pub async fn list_with_service_counts(&self) -> Result<Vec<(Agent, i64)>, ApiError> {
        let rows = sqlx::query(
            "SELECT a.*, (SELECT COUNT(*) FROM services s WHERE s.agent_id = a.id) AS service_count
             FROM agents a WHERE a.deleted_at IS NULL
             ORDER BY a.status ASC, a.hostname ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("service_count")?;
            out.push((parse_agent_row(&row)?, count));
        }
        Ok(out)
    }

    /// Agents never seen or last seen at least `days` ago; excludes
    /// soft-deleted.
    #[instrument(skip(self), fields(repo = "agents", operation = "list_offline_since"))]
    pub async fn list_offline_since(&self, days: u32) -> Result<Vec<Agent>, ApiError> {
        let cutoff = self.clock.now_ms() - (days as i64) * 86_400_000;
        let rows = sqlx::query(
            "SELECT * FROM agents
             WHERE deleted_at IS NULL AND (last_seen_at IS NULL OR last_seen_at < $1)
             ORDER BY hostname ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_agent_row(&row)?);
        }
        Ok(out)
    }

    /// Marks deleted_at; metrics, snapshots, and services are kept.
    #[instrument(skip(self), fields(repo = "agents", operation = "soft_delete"))]
    pub async fn soft_delete(&self, id: &str) -> Result<Agent, ApiError> {
        let agent = self.get(id).await?;
        let now = self.clock.now_ms();
        let r = sqlx::query("UPDATE agents SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if r.rows_affected() == 0 {
            return Err(ApiError::NotFound("agent".into()));
        }
        Ok(agent)
    }

    /// Clears deleted_at; Conflict if the agent is not currently soft-deleted.
    #[instrument(skip(self), fields(repo = "agents", operation = "restore"))]
    pub async fn restore(&self, id: &str) -> Result<Agent, ApiError> {
        let r = sqlx::query("UPDATE agents SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if r.rows_affected() == 0 {
            // Distinguish unknown id from an agent that was never deleted.
            let exists = sqlx::query("SELECT 1 FROM agents WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            return match exists {
                Some(_) => Err(ApiError::Conflict("agent is not deleted".into())),
                None => Err(ApiError::NotFound("agent".into())),
            };
        }
        self.get(id).await
    }
}

async fn fetch_agent_any<'e, E>(executor: E, id: &str) -> Result<Agent, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query("SELECT * FROM agents WHERE id = $1")
        .bind(id)
        .fetch_one(executor)
        .await?;
    parse_agent_row(&row)
}

fn parse_agent_row(row: &SqliteRow) -> Result<Agent, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = AgentStatus::parse(&status_str).unwrap_or_else(|| {
        tracing::debug!(status = %status_str, "unknown agent status in store, treating as offline");
        AgentStatus::Offline
    });
    Ok(Agent {
        id: row.try_get("id")?,
        hwid: row.try_get("hwid")?,
        agent_id: row.try_get("agent_id")?,
        hostname: row.try_get("hostname")?,
        ip_address: row.try_get("ip_address")?,
        api_token: row.try_get("api_token")?,
        os_type: row.try_get("os_type")?,
        os_version: row.try_get("os_version")?,
        cpu_cores: row.try_get("cpu_cores")?,
        total_memory_mb: row.try_get("total_memory_mb")?,
        total_disk_gb: row.try_get("total_disk_gb")?,
        status,
        last_seen_at: row.try_get("last_seen_at")?,
        registered_at: row.try_get("registered_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// agent_id and api_token are unique too; a clash there is a caller problem,
/// not a storage failure.
fn map_unique_violation(e: sqlx::Error) -> ApiError {
    let is_unique = e
        .as_database_error()
        .is_some_and(|d| d.kind() == sqlx::error::ErrorKind::UniqueViolation);
    if is_unique {
        ApiError::Conflict("agent_id or api_token already in use".into())
    } else {
        ApiError::Storage(e)
    }
}
