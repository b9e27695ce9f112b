//! Tool trait: the uniform city-lookup contract.
//!
//! Every tool takes a single city name and answers with a structured JSON
//! object. Failures are never protocol errors: [`ToolRegistry::invoke`]
//! folds them into an `{"error": "..."}` observation the reasoning loop
//! reads like any other result.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// What the reasoning loop observes after invoking a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(pub serde_json::Value);

impl Observation {
    /// A structured `{"error": ...}` observation.
    pub fn error(message: impl Into<String>) -> Self {
        Self(serde_json::json!({ "error": message.into() }))
    }

    /// A free-text observation (used for loop-level notices such as an invalid tool name).
    pub fn text(message: impl Into<String>) -> Self {
        Self(serde_json::Value::String(message.into()))
    }

    pub fn is_error(&self) -> bool {
        self.0.get("error").is_some()
    }

    /// String field lookup, for building summaries from structured results.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Render for the model's scratchpad: plain text stays as-is, objects become JSON.
    pub fn render(&self) -> String {
        match &self.0 {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Value> for Observation {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// The core Tool trait.
///
/// Implemented by the weather, time, and city-facts lookups.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses in `Action:` lines (e.g., "WeatherTool").
    fn name(&self) -> &str;

    /// Short alias accepted from callers (e.g., "weather").
    fn alias(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Look up information for a city.
    async fn lookup(&self, city: &str) -> Result<serde_json::Value, ToolError>;
}

/// A registry of available tools, kept in registration order so the
/// prompt lists them deterministically.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Get a tool by name or alias, ignoring case and surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        let wanted = name.trim();
        self.tools
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted) || t.alias().eq_ignore_ascii_case(wanted))
            .map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// `name: description` lines, one per tool.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Invoke a tool by name. Never fails: errors become `{"error": ...}`.
    pub async fn invoke(&self, name: &str, city: &str) -> Observation {
        let Some(tool) = self.get(name) else {
            return Observation::error(ToolError::NotFound(name.to_string()).to_string());
        };

        let city = city.trim();
        if city.is_empty() {
            return Observation::error(
                ToolError::InvalidArguments("a city name is required".into()).to_string(),
            );
        }

        let started = Instant::now();
        match tool.lookup(city).await {
            Ok(value) => {
                debug!(
                    tool = tool.name(),
                    city,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Tool lookup completed"
                );
                Observation(value)
            }
            Err(e) => {
                warn!(tool = tool.name(), city, error = %e, "Tool lookup failed");
                Observation::error(e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "EchoTool"
        }
        fn alias(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the city"
        }
        async fn lookup(&self, city: &str) -> Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!({ "city": city }))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "BrokenTool"
        }
        fn alias(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        async fn lookup(&self, _city: &str) -> Result<serde_json::Value, ToolError> {
            Err(ToolError::Transport {
                tool_name: "BrokenTool".into(),
                reason: "connection refused".into(),
            })
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(BrokenTool));
        registry
    }

    #[test]
    fn lookup_by_name_or_alias() {
        let registry = registry();
        assert!(registry.get("EchoTool").is_some());
        assert!(registry.get("echo").is_some());
        assert!(registry.get(" ECHOTOOL ").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn describe_keeps_registration_order() {
        let text = registry().describe();
        assert_eq!(
            text,
            "EchoTool: Echoes back the city\nBrokenTool: Always fails"
        );
    }

    #[tokio::test]
    async fn invoke_returns_structured_result() {
        let obs = registry().invoke("echo", "  Tokyo ").await;
        assert!(!obs.is_error());
        assert_eq!(obs.field("city"), Some("Tokyo"));
    }

    #[tokio::test]
    async fn failures_become_error_observations() {
        let registry = registry();

        let obs = registry.invoke("BrokenTool", "Paris").await;
        assert!(obs.is_error());
        assert!(obs.field("error").unwrap().contains("connection refused"));

        let obs = registry.invoke("missing", "Paris").await;
        assert!(obs.field("error").unwrap().contains("Tool not found"));

        let obs = registry.invoke("echo", "   ").await;
        assert!(obs.is_error());
    }

    #[test]
    fn render_text_and_objects() {
        assert_eq!(Observation::text("plain").render(), "plain");
        assert_eq!(
            Observation::error("boom").render(),
            r#"{"error":"boom"}"#
        );
    }
}
