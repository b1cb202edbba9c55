//! Per-endpoint request statistics
//!
//! Counters are keyed by the request path as configured (never the full
//! request URI). Each endpoint entry updates under its own map guard, so
//! per-endpoint figures are always mutually consistent; the global totals
//! are independent counters.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub total_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub status_codes: BTreeMap<u16, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_request: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_request: Option<DateTime<Utc>>,
    pub conditional_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub start_time: DateTime<Utc>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub endpoints: BTreeMap<String, EndpointStats>,
}

pub struct StatsRegistry {
    start_time: DateTime<Utc>,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    endpoints: DashMap<String, EndpointStats>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            endpoints: DashMap::new(),
        }
    }

    /// Record a completed request against an endpoint path.
    ///
    /// Global totals update first; the per-endpoint block updates under the
    /// entry guard so its invariants hold at any observation point.
    pub fn record(&self, path: &str, elapsed_ms: u64, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }

        let now = Utc::now();
        let mut entry = self.endpoints.entry(path.to_string()).or_default();

        if entry.request_count == 0 {
            entry.min_duration_ms = elapsed_ms;
            entry.first_request = Some(now);
        } else {
            entry.min_duration_ms = entry.min_duration_ms.min(elapsed_ms);
        }
        entry.max_duration_ms = entry.max_duration_ms.max(elapsed_ms);
        entry.total_duration_ms += elapsed_ms;
        entry.request_count += 1;
        if status >= 400 {
            entry.error_count += 1;
        }
        *entry.status_codes.entry(status).or_insert(0) += 1;
        entry.last_request = Some(now);
    }

    /// Bump the conditional counter for a `conditional_error` endpoint and
    /// return the post-increment value. Atomic per endpoint.
    pub fn increment_conditional(&self, path: &str) -> u64 {
        let mut entry = self.endpoints.entry(path.to_string()).or_default();
        entry.conditional_count += 1;
        entry.conditional_count
    }

    pub fn get_conditional(&self, path: &str) -> u64 {
        self.endpoints
            .get(path)
            .map(|entry| entry.conditional_count)
            .unwrap_or(0)
    }

    /// Deep copy suitable for JSON serialization.
    pub fn snapshot(&self) -> ServerStats {
        let endpoints = self
            .endpoints
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        ServerStats {
            start_time: self.start_time,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            endpoints,
        }
    }
}
