//! Domain event system: decoupled notifications between components.
//!
//! The store, the reasoning loop, and the orchestrator publish events when
//! something interesting happens. Subscribers (the cli's verbose mode,
//! tests) react without the publishers knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn finished and its exchange was recorded
    TurnCompleted {
        session_id: String,
        /// "finished", "iteration_capped", or "recovered"
        completion: String,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked by the reasoning loop
    ToolInvoked {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Older messages were folded into a session summary
    SessionSummarized {
        session_id: String,
        strategy: String,
        summarization_count: u64,
        timestamp: DateTime<Utc>,
    },

    /// A session was cleared
    SessionCleared {
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
