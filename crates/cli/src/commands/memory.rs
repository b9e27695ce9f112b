//! `wayfarer memory` - Session memory on a running gateway.
//!
//! Sessions live inside the gateway process, so these commands talk to its
//! `/api/v1/memory` endpoints.

use serde_json::{Value, json};
use wayfarer_config::AppConfig;

pub struct MemoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl MemoryClient {
    /// Use `url` if given, else the configured gateway address.
    pub fn from_config(url: Option<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let base_url = match url {
            Some(url) => url,
            None => {
                let config =
                    AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
                format!("http://{}:{}", config.gateway.host, config.gateway.port)
            }
        };
        Ok(Self::new(base_url))
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/memory{path}", self.base_url)
    }

    pub async fn show(&self, session: &str) -> Result<(), Box<dyn std::error::Error>> {
        let response = self
            .http
            .get(self.endpoint(""))
            .query(&[("session_id", session)])
            .send()
            .await
            .map_err(|e| format!("Could not reach the gateway at {}: {e}", self.base_url))?;
        let body = read_body(response).await?;

        println!("Session Memory: {}", body["session_id"].as_str().unwrap_or(session));
        println!("====================");
        println!("  Messages held:   {}", body["message_count"]);
        println!("  Total messages:  {}", body["stats"]["total_messages"]);
        println!("  Summarized:      {} time(s)", body["stats"]["summarization_count"]);
        println!("  Threshold:       {} exchanges", body["stats"]["summarization_threshold"]);

        let summary = body["summary"].as_str().unwrap_or_default();
        if !summary.is_empty() {
            println!("\n  Summary:\n    {}", summary.replace('\n', "\n    "));
        }

        if let Some(messages) = body["recent_messages"].as_array() {
            if !messages.is_empty() {
                println!("\n  Recent messages:");
            }
            for message in messages {
                println!(
                    "    [{}] {}",
                    message["type"].as_str().unwrap_or("?"),
                    message["content"].as_str().unwrap_or_default()
                );
            }
        }
        Ok(())
    }

    pub async fn clear(&self, session: &str) -> Result<(), Box<dyn std::error::Error>> {
        let body = self.post("/clear", json!({ "session_id": session })).await?;
        println!("{}", body["message"].as_str().unwrap_or("Cleared"));
        Ok(())
    }

    pub async fn summarize(&self, session: &str) -> Result<(), Box<dyn std::error::Error>> {
        let body = self.post("/summary", json!({ "session_id": session })).await?;
        println!("{}", body["message"].as_str().unwrap_or_default());
        Ok(())
    }

    pub async fn threshold(
        &self,
        value: i64,
        session: Option<&str>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let body = self
            .post(
                "/threshold",
                json!({ "session_id": session, "threshold": value }),
            )
            .await?;
        println!("{}", body["message"].as_str().unwrap_or_default());
        Ok(())
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value, Box<dyn std::error::Error>> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("Could not reach the gateway at {}: {e}", self.base_url))?;
        read_body(response).await
    }
}

/// The JSON body, or the gateway's `{error}` as an error.
async fn read_body(response: reqwest::Response) -> Result<Value, Box<dyn std::error::Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        let error = body["error"].as_str().unwrap_or("request failed");
        return Err(format!("Gateway returned {status}: {error}").into());
    }
    Ok(body)
}
