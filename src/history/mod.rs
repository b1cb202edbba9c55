//! Bounded request history
//!
//! A newest-first ring of completed request records. The ring holds at most
//! `capacity` records; overflow evicts the oldest.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 1000;

/// One completed HTTP request as observed by the capture layer.
///
/// `path` is the full request URI including any query string; statistics
/// keys use the path component only.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: u64,
    pub remote_addr: String,
}

pub struct RequestHistory {
    capacity: usize,
    records: Mutex<VecDeque<RequestRecord>>,
}

impl Default for RequestHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn append(&self, record: RequestRecord) {
        let mut records = self.records.lock();
        records.push_front(record);
        records.truncate(self.capacity);
    }

    /// Copy of the ring, newest first.
    pub fn snapshot(&self) -> Vec<RequestRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
