//! Control plane handlers
//!
//! Read and mutate the configuration, read statistics, read the request
//! history. Mutations validate before touching state; failures are
//! reported as 400 with the offending reason.

use crate::config::{Config, EndpointConfig};
use crate::error::ApiError;
use crate::history::RequestRecord;
use crate::server::app::AppState;
use crate::stats::ServerStats;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct UpsertRequest {
    pub path: String,
    pub config: EndpointConfig,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub path: String,
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<Config>, ApiError> {
    Ok(Json(state.store.snapshot().await?))
}

pub async fn put_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let config: Config = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid configuration body: {}", e)))?;

    state.store.replace(config).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Configuration updated"
    })))
}

pub async fn post_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: UpsertRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid endpoint body: {}", e)))?;

    if request.path.is_empty() {
        return Err(ApiError::InvalidRequest(
            "endpoint path cannot be empty".to_string(),
        ));
    }

    state.store.upsert_endpoint(&request.path, request.config).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Endpoint updated"
    })))
}

pub async fn delete_config(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Value>, ApiError> {
    if params.path.is_empty() {
        return Err(ApiError::InvalidRequest(
            "path query parameter is required".to_string(),
        ));
    }

    state.store.delete_endpoint(&params.path).await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Endpoint deleted"
    })))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<ServerStats> {
    Json(state.stats.snapshot())
}

pub async fn get_requestlog(State(state): State<AppState>) -> Json<Vec<RequestRecord>> {
    Json(state.history.snapshot())
}
