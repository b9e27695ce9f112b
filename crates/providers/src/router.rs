//! Provider router: selects the correct LLM provider based on config.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect, so
//! the router only has to pick a base URL, key, and default model.

use crate::openai_compat::OpenAiCompatProvider;
use std::collections::HashMap;
use std::sync::Arc;
use wayfarer_core::provider::Provider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &wayfarer_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);

        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// The model to use with a provider: the per-provider override, else the
/// configured default, else the provider's well-known default.
pub fn resolve_model(config: &wayfarer_config::AppConfig) -> String {
    if let Some(model) = config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
    {
        return model;
    }

    let configured = config.default_model.trim();
    if !configured.is_empty() {
        return configured.to_string();
    }

    default_model(&config.default_provider).to_string()
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "google" | "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

/// The default model for well-known providers.
pub fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "groq" => "deepseek-r1-distill-llama-70b",
        "google" | "gemini" => "gemini-1.5-flash",
        "ollama" => "llama3.1",
        _ => "gpt-4o-mini",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["openai"]);
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("groq").contains("api.groq.com"));
        assert!(default_base_url("google").contains("generativelanguage.googleapis.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default());
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn model_resolution_prefers_provider_override() {
        let mut config = AppConfig {
            default_provider: "groq".into(),
            ..AppConfig::default()
        };
        assert_eq!(resolve_model(&config), "gpt-4o-mini");

        config.default_model = String::new();
        assert_eq!(resolve_model(&config), "deepseek-r1-distill-llama-70b");

        config.providers.insert(
            "groq".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("llama-3.3-70b-versatile".into()),
            },
        );
        assert_eq!(resolve_model(&config), "llama-3.3-70b-versatile");
    }
}
