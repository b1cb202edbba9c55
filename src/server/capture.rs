//! Request capture layer
//!
//! Wraps every routed handler: times the request, observes the final status
//! written to the client, then records statistics, appends the history
//! record, and publishes it to observers. Statistics are keyed by the URL
//! path component; the history record keeps the full request URI.

use crate::history::RequestRecord;
use crate::observer::Event;
use crate::server::app::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::warn;

pub async fn capture_request(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let started_at = Utc::now();
    let method = req.method().to_string();
    let uri = req.uri().clone();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    state.stats.record(uri.path(), elapsed_ms, status);

    let full_uri = uri
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let record = RequestRecord {
        timestamp: started_at,
        method,
        path: full_uri,
        status,
        duration_ms: elapsed_ms,
        remote_addr,
    };

    match serde_json::to_value(&record) {
        Ok(data) => state.observers.broadcast(Event::request_log(data)),
        Err(e) => warn!("failed to encode request record: {}", e),
    }
    state.history.append(record);

    response
}
