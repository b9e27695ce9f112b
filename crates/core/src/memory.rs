//! Session memory: per-session message logs with a rolling summary.
//!
//! A [`Session`] keeps recent messages verbatim. Once the log grows past
//! `summarization_threshold` exchanges, everything except the latest
//! exchange is folded into `summary` by a [`Summarizer`]. The store
//! behind [`SessionMemory`] owns every session for the process lifetime.

use crate::error::MemoryError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session used when a caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Number of messages kept verbatim after a summarization pass.
pub const RETAINED_MESSAGES: usize = 2;

/// Counters and configuration for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_messages: u64,
    pub summarization_count: u64,
    pub last_summarization_time: Option<DateTime<Utc>>,
    /// Token budget for recent history when composing prompts.
    pub buffer_size: usize,
    /// Exchanges kept before older ones are summarized.
    pub summarization_threshold: usize,
}

impl SessionStats {
    pub fn new(buffer_size: usize, summarization_threshold: usize) -> Self {
        Self {
            total_messages: 0,
            summarization_count: 0,
            last_summarization_time: None,
            buffer_size,
            summarization_threshold,
        }
    }
}

/// One conversational context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub message_log: Vec<Message>,
    /// Empty when nothing has been summarized yet.
    pub summary: String,
    pub stats: SessionStats,
}

impl Session {
    pub fn new(session_id: impl Into<String>, buffer_size: usize, threshold: usize) -> Self {
        Self {
            session_id: session_id.into(),
            message_log: Vec::new(),
            summary: String::new(),
            stats: SessionStats::new(buffer_size, threshold),
        }
    }

    /// Append a user message and the assistant's reply.
    pub fn push_exchange(&mut self, user_text: &str, assistant_text: &str) {
        self.message_log.push(Message::user(user_text));
        self.message_log.push(Message::assistant(assistant_text));
        self.stats.total_messages += 2;
    }

    /// True once the log holds more than `threshold` exchanges.
    pub fn needs_summary(&self) -> bool {
        self.message_log.len() > self.stats.summarization_threshold * 2
    }

    /// Messages that a summarization pass would fold into the summary.
    pub fn evictable(&self) -> &[Message] {
        let keep_from = self.message_log.len().saturating_sub(RETAINED_MESSAGES);
        &self.message_log[..keep_from]
    }

    /// Replace the summary and drop the `evicted` oldest messages.
    pub fn apply_summary(&mut self, summary: String, evicted: usize) {
        let evicted = evicted.min(self.message_log.len());
        self.message_log.drain(..evicted);
        self.summary = summary;
        self.stats.summarization_count += 1;
        self.stats.last_summarization_time = Some(Utc::now());
    }

    /// Forget history and counters but keep the configured limits.
    pub fn reset(&mut self) {
        self.message_log.clear();
        self.summary.clear();
        self.stats = SessionStats::new(self.stats.buffer_size, self.stats.summarization_threshold);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            summary: self.summary.clone(),
            recent_messages: self.message_log.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Read-only view returned by [`SessionMemory::read`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub summary: String,
    pub recent_messages: Vec<Message>,
    pub stats: SessionStats,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.recent_messages.is_empty()
    }
}

/// Which sessions a threshold change applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdScope {
    /// The store default and every existing session.
    Global,
    /// A single session, created if unseen.
    Session(String),
}

/// Outcome of a forced summarization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryUpdate {
    Updated(String),
    NotNeeded,
}

impl SummaryUpdate {
    /// The new summary, or a notice that nothing needed summarizing.
    pub fn message(&self) -> &str {
        match self {
            SummaryUpdate::Updated(summary) => summary,
            SummaryUpdate::NotNeeded => "No summary needed yet: the conversation is below the summarization threshold.",
        }
    }
}

/// Produces a rolling summary from evicted messages.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Strategy name for logs and events (e.g., "llm", "placeholder").
    fn name(&self) -> &str;

    /// Fold `evicted` into `previous_summary` (which may be empty).
    async fn summarize(
        &self,
        previous_summary: &str,
        evicted: &[Message],
    ) -> Result<String, MemoryError>;
}

/// The session memory interface used by the orchestrator and the gateway.
///
/// Unknown session IDs never error: every operation behaves as if the
/// session had just been created with no history.
#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Return the session, creating an empty one if unseen.
    async fn get_or_create(&self, session_id: &str) -> Session;

    /// Append a user/assistant exchange and summarize if over threshold.
    async fn append_exchange(&self, session_id: &str, user_text: &str, assistant_text: &str);

    /// Summary, recent messages, and stats. Does not mutate.
    async fn read(&self, session_id: &str) -> SessionSnapshot;

    /// Empty the log and summary, reset counters, keep configured limits.
    async fn clear(&self, session_id: &str);

    /// Set the summarization threshold. `n` must be a positive integer.
    async fn set_summarization_threshold(
        &self,
        scope: ThresholdScope,
        n: i64,
    ) -> Result<(), MemoryError>;

    /// Force a summarization pass now.
    async fn update_summary(&self, session_id: &str) -> SummaryUpdate;

    /// IDs of every session the store knows about.
    async fn session_ids(&self) -> Vec<String>;
}
