// Agent lifecycle handlers: register, heartbeat, listing, delete/restore

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::{AppState, bearer_token};
use crate::error::ApiError;
use crate::models::{RegisterOutcome, RegisterRequest};

/// POST /api/agent/register — idempotent upsert keyed by hwid.
/// 201 on first contact, 200 on re-registration or restore.
pub(super) async fn register(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.hwid.is_empty() || req.agent_id.is_empty() || req.api_token.is_empty() {
        return Err(ApiError::InvalidInput(
            "hwid, agent_id and api_token must be non-empty".into(),
        ));
    }

    let (outcome, agent) = state.agents.register(&req).await?;
    let (status, message) = match outcome {
        RegisterOutcome::Created => (StatusCode::CREATED, "Agent registered successfully"),
        RegisterOutcome::Updated => (StatusCode::OK, "Agent already registered"),
        RegisterOutcome::Restored => (
            StatusCode::OK,
            "Agent restored and re-registered successfully",
        ),
    };
    tracing::info!(hwid = %agent.hwid, hostname = %agent.hostname, ?outcome, "agent registration");

    Ok((
        status,
        axum::Json(serde_json::json!({
            "success": true,
            "message": message,
            "agent_id": agent.id,
            "api_token": agent.api_token,
        })),
    ))
}

#[derive(Deserialize, Default)]
pub(super) struct HeartbeatBody {
    api_token: Option<String>,
}

/// POST /api/agent/heartbeat
pub(super) async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<axum::Json<HeartbeatBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|b| b.0).unwrap_or_default();
    let token = bearer_token(&headers, body.api_token.as_deref())?;
    state.agents.heartbeat(&token).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "message": "Heartbeat received",
    })))
}

/// GET /api/agents — fleet listing with derived liveness counts.
pub(super) async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (agents, summary) = state.query.list_agents().await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": agents,
        "summary": summary,
    })))
}

/// GET /api/agents/{id}
pub(super) async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.query.get_agent(&id).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": detail,
    })))
}

#[derive(Deserialize)]
pub(super) struct OfflineParams {
    days: Option<u32>,
}

/// GET /api/agents/offline/candidates?days=N
pub(super) async fn offline(
    State(state): State<AppState>,
    Query(params): Query<OfflineParams>,
) -> Result<impl IntoResponse, ApiError> {
    let days = params.days.unwrap_or(state.config.liveness.offline_days);
    let agents = state.query.offline_agents(days).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": agents,
        "count": agents.len(),
    })))
}

/// DELETE /api/agents/{id} — soft delete; history is retained.
pub(super) async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.agents.soft_delete(&id).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "message": format!("Agent '{}' ({}) has been deleted.", agent.agent_id, agent.hostname),
    })))
}

/// POST /api/agents/{id}/restore — 409 if the agent is not deleted.
pub(super) async fn restore(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.agents.restore(&id).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "message": "Agent restored successfully",
        "data": agent,
    })))
}
