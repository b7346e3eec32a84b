//! In-process session lifecycle event bus.
//!
//! A `tokio::sync::broadcast` channel with an `EventBusMetrics` counter
//! block and no in-crate subscriber. Nothing subscribes yet — it exists so
//! a hosting application can `subscribe()` for its own notification/audit
//! pipeline without this crate knowing about it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    Started { session_id: Uuid, provider_id: String },
    Completed { session_id: Uuid },
    Failed { session_id: Uuid, message: String },
    Stopped { session_id: Uuid },
}

impl SessionEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::Started { session_id, .. }
            | SessionEvent::Completed { session_id }
            | SessionEvent::Failed { session_id, .. }
            | SessionEvent::Stopped { session_id } => *session_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventBusMetrics {
    pub events_published: u64,
    pub events_dropped: u64,
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(256);
        Arc::new(Self { sender, published: AtomicU64::new(0), dropped: AtomicU64::new(0) })
    }

    /// Best-effort: a full channel or zero subscribers both count as a
    /// normal outcome, not an error — nothing in this crate depends on
    /// delivery succeeding.
    pub fn publish(&self, event: SessionEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn metrics(&self) -> EventBusMetrics {
        EventBusMetrics {
            events_published: self.published.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender, published: AtomicU64::new(0), dropped: AtomicU64::new(0) }
    }
}
