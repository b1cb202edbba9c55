//! Endpoint dispatch
//!
//! The fallback handler for every path the control plane does not own:
//! exact lookup in the live endpoint table, behavior evaluation on a hit,
//! static file serving on a miss.

use crate::config::EndpointConfig;
use crate::error::ApiError;
use crate::server::app::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tower::util::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error};

const PLACEHOLDER_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Faultline</title></head>\n<body>\n<h1>Faultline</h1>\n<p>This is the placeholder landing page. Configure endpoints via the /config API.</p>\n</body>\n</html>\n";

pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let path = req.uri().path().to_string();

    let config = match state.store.snapshot().await {
        Ok(config) => config,
        Err(e) => return ApiError::from(e).into_response(),
    };

    // Table keys are URL paths without query strings.
    match config.endpoints.get(&path) {
        Some(endpoint) => evaluate(&state, &path, endpoint).await,
        None => serve_static(&config.server.static_dir, req).await,
    }
}

async fn evaluate(state: &AppState, path: &str, endpoint: &EndpointConfig) -> Response {
    match endpoint {
        EndpointConfig::Error {
            status_code,
            message,
        } => {
            debug!(endpoint = path, status = status_code, "error behavior");
            json_response(
                *status_code,
                json!({ "error": message.clone().unwrap_or_default() }),
            )
        },
        EndpointConfig::Delay { delay_ms, response } => {
            if *delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            }
            json_response(200, response.clone().unwrap_or_else(|| json!({})))
        },
        EndpointConfig::ConditionalError {
            error_every_n,
            status_code,
            success_response,
        } => {
            // Increment-and-test is atomic per endpoint: the k*Nth hit is
            // always the error branch.
            let n = state.stats.increment_conditional(path);
            if n % *error_every_n == 0 {
                debug!(endpoint = path, hit = n, "conditional error triggered");
                json_response(*status_code, json!({ "error": "Conditional error triggered" }))
            } else {
                json_response(200, success_response.clone().unwrap_or_else(|| json!({})))
            }
        },
    }
}

fn json_response(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Serve a file from the static root, creating the root and a placeholder
/// landing page on first access.
async fn serve_static(static_dir: &str, req: Request) -> Response {
    let root = PathBuf::from(static_dir);
    if let Err(e) = ensure_static_root(&root) {
        error!("failed to prepare static root {}: {}", root.display(), e);
        return ApiError::Internal("static root unavailable".to_string()).into_response();
    }

    let rel = req.uri().path().trim_start_matches('/');
    let rel = if rel.is_empty() { "index.html" } else { rel };

    // Reject traversal before touching the filesystem; canonicalization
    // below catches symlink escapes of existing files.
    if Path::new(rel)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return ApiError::Forbidden("path escapes static root".to_string()).into_response();
    }

    let target = root.join(rel);
    if let (Ok(resolved), Ok(root_resolved)) = (target.canonicalize(), root.canonicalize()) {
        if !resolved.starts_with(&root_resolved) {
            return ApiError::Forbidden("path escapes static root".to_string()).into_response();
        }
    }

    match ServeFile::new(&target).oneshot(req).await {
        Ok(response) => response.map(axum::body::Body::new),
        Err(infallible) => match infallible {},
    }
}

fn ensure_static_root(root: &Path) -> std::io::Result<()> {
    if !root.exists() {
        fs::create_dir_all(root)?;
    }
    let index = root.join("index.html");
    if !index.exists() {
        fs::write(index, PLACEHOLDER_PAGE)?;
    }
    Ok(())
}
