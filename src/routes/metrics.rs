// Metric ingestion and read views (realtime / history / snapshots)

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::{AppState, bearer_token};
use crate::error::ApiError;
use crate::models::{MetricType, SamplePayload, SnapshotPeriod};

#[derive(Deserialize)]
pub(super) struct IngestBody {
    api_token: Option<String>,
    metrics: Vec<SamplePayload>,
}

/// POST /api/metrics — whole-batch ingest; any invalid sample rejects all.
pub(super) async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers, body.api_token.as_deref())?;
    let count = state.ingestor.ingest_metrics(&token, &body.metrics).await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(serde_json::json!({
            "success": true,
            "message": "Metrics stored successfully",
            "count": count,
        })),
    ))
}

fn parse_type_param(raw: Option<&str>) -> Result<Option<MetricType>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) => MetricType::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput(format!("unknown metric type '{}'", s))),
    }
}

#[derive(Deserialize)]
pub(super) struct HistoryParams {
    hours: Option<u32>,
    #[serde(rename = "type")]
    metric_type: Option<String>,
}

/// GET /api/metrics/{id}?hours=N&type=cpu — windowed raw series with
/// statistics recomputed from the raw rows.
pub(super) async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = params.hours.unwrap_or(1);
    let metric_type = parse_type_param(params.metric_type.as_deref())?;
    let data = state.query.history(&id, hours, metric_type).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}

/// GET /api/metrics/{id}/realtime — latest fresh sample per type; stale
/// types are omitted.
pub(super) async fn realtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.query.realtime(&id).await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}

#[derive(Deserialize)]
pub(super) struct SnapshotParams {
    period: Option<String>,
    hours: Option<u32>,
    #[serde(rename = "type")]
    metric_type: Option<String>,
}

/// GET /api/metrics/{id}/snapshots?period=1min&hours=N&type=cpu
pub(super) async fn snapshots(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SnapshotParams>,
) -> Result<impl IntoResponse, ApiError> {
    let period = match params.period.as_deref() {
        None => SnapshotPeriod::OneMin,
        Some(s) => SnapshotPeriod::parse(s)
            .ok_or_else(|| ApiError::InvalidInput(format!("unknown snapshot period '{}'", s)))?,
    };
    let hours = params.hours.unwrap_or(24);
    let metric_type = parse_type_param(params.metric_type.as_deref())?;
    let data = state
        .query
        .snapshots(&id, period, hours, metric_type)
        .await?;
    Ok(axum::Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}
