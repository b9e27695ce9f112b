//! Error types for the Wayfarer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Wayfarer operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Reasoning failures nothing could recover from ---
    #[error("Processing error: {detail}")]
    Processing { detail: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// An administration call supplied an invalid threshold or limit.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The summarizer could not produce a summary.
    #[error("Summarization failed: {0}")]
    Summarization(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Error fetching data for {tool_name}: {reason}")]
    Transport { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    /// The backing service answered, but refused the lookup.
    #[error("{0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn configuration_error_mentions_cause() {
        let err = Error::Memory(MemoryError::Configuration(
            "summarization threshold must be a positive integer, got -1".into(),
        ));
        let text = err.to_string();
        assert!(text.contains("Configuration error"));
        assert!(text.contains("-1"));
    }

    #[test]
    fn unavailable_tool_error_is_bare_message() {
        let err = ToolError::Unavailable("Invalid WeatherAPI.com API key.".into());
        assert_eq!(err.to_string(), "Invalid WeatherAPI.com API key.");
    }

    #[test]
    fn processing_error_keeps_detail() {
        let err = Error::Processing {
            detail: "Could not parse LLM output: `???`".into(),
        };
        assert!(err.to_string().contains("Could not parse LLM output"));
    }
}
