//! Health Routes
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (store answers queries)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;
use crate::store::ReadingFeed;

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.with_store(|store| store.reading_count()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, store, readings) = match state.with_store(|store| store.reading_count()).await {
        Ok(count) => ("healthy", "ok", count),
        Err(_) => ("unhealthy", "error", 0),
    };

    Json(HealthResponse {
        status: status.to_string(),
        store: store.to_string(),
        readings,
        live_subscriptions: state.store.live_subscriptions(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
