//! In-memory session store.
//!
//! Sessions live for the process lifetime. The outer map is guarded by an
//! `RwLock`; each session has its own `Mutex` so appends to one session
//! serialize while other sessions proceed untouched.

use crate::summarizer::PlaceholderSummarizer;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use wayfarer_core::error::MemoryError;
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::memory::{
    DEFAULT_SESSION_ID, Session, SessionMemory, SessionSnapshot, Summarizer, SummaryUpdate,
    ThresholdScope,
};

/// Limits applied to sessions created from now on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub buffer_size: usize,
    pub summarization_threshold: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            buffer_size: 2000,
            summarization_threshold: 5,
        }
    }
}

type SessionHandle = Arc<Mutex<Session>>;

pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    limits: RwLock<StoreLimits>,
    summarizer: Arc<dyn Summarizer>,
    fallback: PlaceholderSummarizer,
    events: Option<Arc<EventBus>>,
}

impl InMemorySessionStore {
    /// A store that summarizes with the placeholder digest.
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits: RwLock::new(limits),
            summarizer: Arc::new(PlaceholderSummarizer),
            fallback: PlaceholderSummarizer,
            events: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn limits(&self) -> StoreLimits {
        *self.limits.read().await
    }

    async fn existing(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn handle(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.existing(session_id).await {
            return handle;
        }

        let limits = self.limits().await;
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "Creating session");
                Arc::new(Mutex::new(Session::new(
                    session_id,
                    limits.buffer_size,
                    limits.summarization_threshold,
                )))
            })
            .clone()
    }

    /// Fold everything but the latest exchange into the summary.
    /// The caller holds the session lock.
    async fn summarize_locked(&self, session: &mut Session) -> String {
        let evicted = session.evictable().to_vec();

        let (summary, strategy) = match self
            .summarizer
            .summarize(&session.summary, &evicted)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => (summary, self.summarizer.name()),
            Ok(_) => {
                warn!(session_id = %session.session_id, "Summarizer returned nothing, using placeholder");
                (self.fallback.fold(&session.summary, &evicted), self.fallback_name())
            }
            Err(e) => {
                warn!(session_id = %session.session_id, error = %e, "Summarization failed, using placeholder");
                (self.fallback.fold(&session.summary, &evicted), self.fallback_name())
            }
        };
        let strategy = strategy.to_string();

        session.apply_summary(summary.clone(), evicted.len());
        info!(
            session_id = %session.session_id,
            strategy = %strategy,
            evicted = evicted.len(),
            count = session.stats.summarization_count,
            "Session summarized"
        );

        self.publish(DomainEvent::SessionSummarized {
            session_id: session.session_id.clone(),
            strategy,
            summarization_count: session.stats.summarization_count,
            timestamp: Utc::now(),
        });

        summary
    }

    fn fallback_name(&self) -> &str {
        "placeholder"
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

fn normalize(session_id: &str) -> &str {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        DEFAULT_SESSION_ID
    } else {
        trimmed
    }
}

#[async_trait]
impl SessionMemory for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str) -> Session {
        let handle = self.handle(normalize(session_id)).await;
        let session = handle.lock().await;
        session.clone()
    }

    async fn append_exchange(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        let handle = self.handle(normalize(session_id)).await;
        let mut session = handle.lock().await;

        session.push_exchange(user_text, assistant_text);
        debug!(
            session_id = %session.session_id,
            messages = session.message_log.len(),
            "Exchange recorded"
        );

        if session.needs_summary() {
            self.summarize_locked(&mut session).await;
        }
    }

    async fn read(&self, session_id: &str) -> SessionSnapshot {
        let id = normalize(session_id);
        match self.existing(id).await {
            Some(handle) => handle.lock().await.snapshot(),
            None => {
                let limits = self.limits().await;
                Session::new(id, limits.buffer_size, limits.summarization_threshold).snapshot()
            }
        }
    }

    async fn clear(&self, session_id: &str) {
        let id = normalize(session_id);
        if let Some(handle) = self.existing(id).await {
            handle.lock().await.reset();
            info!(session_id = id, "Session cleared");
        }
        self.publish(DomainEvent::SessionCleared {
            session_id: id.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn set_summarization_threshold(
        &self,
        scope: ThresholdScope,
        n: i64,
    ) -> Result<(), MemoryError> {
        let threshold = usize::try_from(n)
            .ok()
            .filter(|t| *t >= 1)
            .ok_or_else(|| {
                MemoryError::Configuration(format!(
                    "summarization threshold must be a positive integer, got {n}"
                ))
            })?;

        match scope {
            ThresholdScope::Global => {
                self.limits.write().await.summarization_threshold = threshold;
                let handles: Vec<SessionHandle> =
                    self.sessions.read().await.values().cloned().collect();
                for handle in handles {
                    handle.lock().await.stats.summarization_threshold = threshold;
                }
                info!(threshold, "Summarization threshold updated for all sessions");
            }
            ThresholdScope::Session(session_id) => {
                let id = normalize(&session_id);
                let handle = self.handle(id).await;
                handle.lock().await.stats.summarization_threshold = threshold;
                info!(session_id = id, threshold, "Summarization threshold updated");
            }
        }
        Ok(())
    }

    async fn update_summary(&self, session_id: &str) -> SummaryUpdate {
        let Some(handle) = self.existing(normalize(session_id)).await else {
            return SummaryUpdate::NotNeeded;
        };
        let mut session = handle.lock().await;
        if !session.needs_summary() {
            return SummaryUpdate::NotNeeded;
        }
        SummaryUpdate::Updated(self.summarize_locked(&mut session).await)
    }

    async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
