//! Session memory for Wayfarer.
//!
//! [`InMemorySessionStore`] implements `wayfarer_core::SessionMemory`:
//! one message log and rolling summary per session, folded by a
//! [`Summarizer`](wayfarer_core::Summarizer) once the log outgrows its
//! threshold.

pub mod store;
pub mod summarizer;

pub use store::{InMemorySessionStore, StoreLimits};
pub use summarizer::{LlmSummarizer, PlaceholderSummarizer, summarizer_for};
