// HTTP routes: agent lifecycle, ingestion, read views

mod agents;
mod metrics;
mod services;

use axum::http::HeaderMap;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::agent_repo::AgentRepo;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::ingestor::Ingestor;
use crate::query::QueryFacade;
use crate::version::{NAME, VERSION};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) agents: Arc<AgentRepo>,
    pub(crate) ingestor: Arc<Ingestor>,
    pub(crate) query: Arc<QueryFacade>,
    pub(crate) config: AppConfig,
}

pub fn app(
    agents: Arc<AgentRepo>,
    ingestor: Arc<Ingestor>,
    query: Arc<QueryFacade>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        agents,
        ingestor,
        query,
        config,
    };
    Router::new()
        .route("/version", get(version_handler)) // GET /version
        .route("/api/health", get(health_handler)) // GET /api/health
        .route("/api/agent/register", post(agents::register)) // POST /api/agent/register
        .route("/api/agent/heartbeat", post(agents::heartbeat)) // POST /api/agent/heartbeat
        .route("/api/agents", get(agents::list)) // GET /api/agents
        .route("/api/agents/offline/candidates", get(agents::offline)) // GET /api/agents/offline/candidates
        .route("/api/agents/{id}", get(agents::show)) // GET /api/agents/{id}
        .route("/api/agents/{id}", delete(agents::destroy)) // DELETE /api/agents/{id}
        .route("/api/agents/{id}/restore", post(agents::restore)) // POST /api/agents/{id}/restore
        .route("/api/metrics", post(metrics::ingest)) // POST /api/metrics
        .route("/api/metrics/{id}", get(metrics::history)) // GET /api/metrics/{id}
        .route("/api/metrics/{id}/realtime", get(metrics::realtime)) // GET /api/metrics/{id}/realtime
        .route("/api/metrics/{id}/snapshots", get(metrics::snapshots)) // GET /api/metrics/{id}/snapshots
        .route("/api/services", post(services::ingest)) // POST /api/services
        .route("/api/services/{id}", get(services::list)) // GET /api/services/{id}
        .route("/api/services/{id}/top", get(services::top)) // GET /api/services/{id}/top
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
async fn version_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/health — liveness probe for the transport layer.
async fn health_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Bearer credential from the Authorization header, falling back to the
/// api_token body field some agents send instead.
pub(crate) fn bearer_token(
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Result<String, ApiError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION)
        && let Ok(s) = value.to_str()
        && let Some(token) = s.strip_prefix("Bearer ")
    {
        return Ok(token.to_string());
    }
    match body_token {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(ApiError::Unauthenticated),
    }
}
