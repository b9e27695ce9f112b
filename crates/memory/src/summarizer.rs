//! Summarization strategies.
//!
//! [`LlmSummarizer`] asks the model to condense evicted messages and then
//! merges the result with the previous summary in a second call.
//! [`PlaceholderSummarizer`] needs no model: it folds every evicted
//! message into a deterministic digest so nothing is dropped silently.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use wayfarer_core::error::MemoryError;
use wayfarer_core::message::{Message, Role};
use wayfarer_core::provider::{Provider, ProviderRequest};
use wayfarer_core::Summarizer;

const SUMMARY_SYSTEM_PROMPT: &str = r#"Summarize the following conversation segment concisely. Preserve:
1. The cities and topics the user asked about
2. Facts the assistant reported (weather, local time, city facts)
3. The user's current goals and any unresolved questions

Keep the summary under 200 words. Write in third person (e.g., "The user asked about..." "The assistant reported...")."#;

const MERGE_SYSTEM_PROMPT: &str = r#"You maintain a running summary of a conversation. Merge the existing summary with the new summary into a single concise summary. Keep every distinct fact; drop repetition. Write in third person."#;

/// Longest excerpt of a single message kept by the placeholder digest.
const EXCERPT_CHARS: usize = 120;

/// Reasoning models open their reply with a private `<think>` block.
static LEADING_THINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*<think>.*?</think>").expect("valid think-block pattern")
});

/// Summaries produced by the language model.
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn ask(&self, system: &str, user: String) -> Result<String, MemoryError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: 0.0,
            max_tokens: Some(512),
            stop: Vec::new(),
        };

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;

        let text = LEADING_THINK
            .replace(&response.message.content, "")
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(MemoryError::Summarization("model returned an empty summary".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn summarize(
        &self,
        previous_summary: &str,
        evicted: &[Message],
    ) -> Result<String, MemoryError> {
        let conversation = evicted
            .iter()
            .map(|m| format!("{}: {}", speaker(m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let fresh = self
            .ask(
                SUMMARY_SYSTEM_PROMPT,
                format!(
                    "Please summarize this conversation:\n\n<conversation>\n{conversation}\n</conversation>"
                ),
            )
            .await?;

        if previous_summary.trim().is_empty() {
            return Ok(fresh);
        }

        debug!(model = %self.model, "Merging new summary into existing summary");
        self.ask(
            MERGE_SYSTEM_PROMPT,
            format!(
                "<existing_summary>\n{previous_summary}\n</existing_summary>\n\n<new_summary>\n{fresh}\n</new_summary>"
            ),
        )
        .await
    }
}

/// Deterministic digest used when no model is available or the model fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderSummarizer;

impl PlaceholderSummarizer {
    /// Append a digest of `evicted` to `previous_summary`.
    pub fn fold(&self, previous_summary: &str, evicted: &[Message]) -> String {
        let exchanges = evicted.len().div_ceil(2);
        let plural = if exchanges == 1 { "" } else { "s" };

        let mut digest = format!("Summarized {exchanges} earlier exchange{plural}:");
        for message in evicted {
            digest.push_str(&format!(
                "\n- {}: {}",
                speaker(message.role),
                excerpt(&message.content)
            ));
        }

        if previous_summary.trim().is_empty() {
            digest
        } else {
            format!("{}\n{digest}", previous_summary.trim_end())
        }
    }
}

#[async_trait]
impl Summarizer for PlaceholderSummarizer {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn summarize(
        &self,
        previous_summary: &str,
        evicted: &[Message],
    ) -> Result<String, MemoryError> {
        Ok(self.fold(previous_summary, evicted))
    }
}

/// Pick a strategy by its configured name. Unknown names and a missing
/// provider both yield the placeholder.
pub fn summarizer_for(
    name: &str,
    provider: Option<Arc<dyn Provider>>,
    model: &str,
) -> Arc<dyn Summarizer> {
    match (name, provider) {
        ("llm", Some(provider)) => Arc::new(LlmSummarizer::new(provider, model)),
        _ => Arc::new(PlaceholderSummarizer),
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}…")
}
