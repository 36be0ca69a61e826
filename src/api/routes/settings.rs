//! Settings Routes
//!
//! - GET /api/users/:user_id/settings - Stored settings document
//! - POST|PUT /api/users/:user_id/settings - Merge into the document

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::{DataResponse, MessageResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::Identity;

/// GET /api/users/:user_id/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<DataResponse<Value>>> {
    let identity = Identity::new(user_id);
    let document = state
        .with_store(move |store| store.get_document(&identity))
        .await?;
    match document {
        Some(document) => Ok(Json(DataResponse::success(document))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

/// POST|PUT /api/users/:user_id/settings
///
/// Creates the document on first write; the server stamps `updated_ts`.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let patch = match payload {
        Ok(Json(Value::Object(map))) if !map.is_empty() => Value::Object(map),
        _ => return Err(ApiError::Validation("Invalid JSON payload".to_string())),
    };

    let identity = Identity::new(user_id);
    state
        .with_store(move |store| store.merge_document(&identity, patch))
        .await?;
    Ok(Json(MessageResponse::success("Settings updated")))
}
