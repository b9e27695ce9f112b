//! LLM Provider implementations for Wayfarer.
//!
//! All providers implement the `wayfarer_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
