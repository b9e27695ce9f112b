//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer agent.
//! This crate has **no framework dependencies**: it defines the model that
//! the memory, tools, providers, agent, and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: chat messages stored in a session log
//! - [`memory`]: sessions, the [`SessionMemory`] interface, and [`Summarizer`]
//! - [`provider`]: the opaque "invoke a model" capability
//! - [`tool`]: the city-lookup tool contract and [`ToolRegistry`]
//! - [`event`]: broadcast bus for domain events

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::{
    DEFAULT_SESSION_ID, Session, SessionMemory, SessionSnapshot, SessionStats, Summarizer,
    SummaryUpdate, ThresholdScope,
};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use tool::{Observation, Tool, ToolRegistry};
