//! Reading Routes
//!
//! - GET /api/readings/recent?limit=N - Most recent N readings, oldest first
//! - POST /api/readings - Ingest one reading

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{DataResponse, RecentParams};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::Reading;

/// Limit used when the query string has none, or a malformed one
pub const DEFAULT_RECENT_LIMIT: usize = 24;

/// Parse `?limit=`, falling back to the default and clamping to `1..=max`
pub fn parse_limit(raw: Option<&str>, max: usize) -> usize {
    let max = max.max(1) as i64;
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_RECENT_LIMIT as i64)
        .clamp(1, max) as usize
}

/// GET /api/readings/recent
pub async fn recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<DataResponse<Vec<Reading>>>> {
    let limit = parse_limit(params.limit.as_deref(), state.config.max_history_limit);
    let readings = state.with_store(move |store| store.recent_readings(limit)).await?;
    tracing::debug!(limit, returned = readings.len(), "Served recent readings");
    Ok(Json(DataResponse::success(readings)))
}

/// POST /api/readings
///
/// Stamps `server_received_ts` and publishes to live subscribers.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Reading>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DataResponse<Reading>>)> {
    let Json(reading) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let reading = reading.received_at(Utc::now().timestamp_millis());
    let stored = state
        .with_store(move |store| store.append_reading(reading))
        .await?;
    tracing::info!(timestamp = stored.timestamp, "Reading ingested");

    Ok((StatusCode::CREATED, Json(DataResponse::success(stored))))
}
