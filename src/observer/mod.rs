//! Observer fan-out
//!
//! Push-subscriptions over bounded per-subscriber queues. Publishers never
//! block: a subscriber whose queue is full or closed is dropped from the
//! set on the next broadcast.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-subscriber queue capacity.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// Wire-level event kind. Names match the WebSocket envelope contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Config,
    Stats,
    ConfigUpdated,
    RequestLog,
}

/// Envelope pushed to every subscriber: `{type, timestamp, data}`.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl Event {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn config_snapshot(data: Value) -> Self {
        Self::new(EventKind::Config, data)
    }

    pub fn stats_snapshot(data: Value) -> Self {
        Self::new(EventKind::Stats, data)
    }

    pub fn config_updated(data: Value) -> Self {
        Self::new(EventKind::ConfigUpdated, data)
    }

    pub fn request_log(data: Value) -> Self {
        Self::new(EventKind::RequestLog, data)
    }
}

/// Registry of push subscribers.
#[derive(Default)]
pub struct ObserverHub {
    subscribers: RwLock<HashMap<Uuid, mpsc::Sender<Event>>>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its id together with the
    /// sending half (for direct replies) and the event stream.
    pub fn subscribe(&self) -> (Uuid, mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.subscribers.write().insert(id, tx.clone());
        debug!(subscriber = %id, "observer registered");
        (id, tx, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.write().remove(&id).is_some() {
            debug!(subscriber = %id, "observer removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every subscriber, best-effort. Subscribers whose
    /// queue is full or closed are dropped.
    pub fn broadcast(&self, event: Event) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                if tx.try_send(event.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in dead {
                subscribers.remove(&id);
                warn!(subscriber = %id, "dropping unresponsive observer");
            }
        }
    }

    /// Cancel all subscribers. Their event streams terminate.
    pub fn shutdown(&self) {
        self.subscribers.write().clear();
    }
}
