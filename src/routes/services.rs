// Service (process-table) ingestion and read views

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::{AppState, bearer_token};
use crate::error::ApiError;
use crate::models::ServicePayload;

#[derive(Deserialize)]
pub(super) struct IngestBody {
    api_token: Option<String>,
    services: Vec<ServicePayload>,
}

/// POST /api/services — fully replaces the agent's current service set.
pub(super) async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers, body.api_token.as_deref())?;
    let count = state
        .ingestor
        .ingest_services(&token, &body.services)
        .await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(serde_json::json!({
            "success": true,
            "message": "Services updated successfully",
            "count": count,
        })),
    ))
}

/// GET /api/services/{id}
pub(super) async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let services = state.query.services(&id).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": services,
        "count": services.len(),
    })))
}

#[derive(Deserialize)]
pub(super) struct TopParams {
    limit: Option<u32>,
}

/// GET /api/services/{id}/top?limit=N — ranked by 0.6 x cpu% + 0.4 x mem%.
pub(super) async fn top(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TopParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(10);
    let services = state.query.top_services(&id, limit).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": services,
    })))
}
