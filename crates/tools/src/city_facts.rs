//! City facts from the Wikipedia REST summary endpoint.

use crate::http::transport_error;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::Tool;

/// Longest summary returned to the model.
const MAX_SUMMARY_CHARS: usize = 1500;

pub struct CityFactsTool {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl CityFactsTool {
    pub fn new(client: reqwest::Client, base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    fn summary_url(&self, title: &str) -> Result<Url, ToolError> {
        let invalid = || ToolError::InvalidArguments(format!("invalid Wikipedia URL: {}", self.base_url));
        let segment = title.replace(' ', "_");
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["page", "summary", segment.as_str()]);
        Ok(url)
    }

    /// `None` when the page does not exist.
    async fn fetch(&self, title: &str) -> Result<Option<PageSummary>, ToolError> {
        let url = self.summary_url(title)?;
        debug!(%url, "Fetching Wikipedia summary");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), self.timeout_secs, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| transport_error(self.name(), self.timeout_secs, e)),
            status => Err(ToolError::Unavailable(format!(
                "Error fetching city facts: HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl Tool for CityFactsTool {
    fn name(&self) -> &str {
        "CityFactsTool"
    }

    fn alias(&self) -> &str {
        "city_facts"
    }

    fn description(&self) -> &str {
        "Useful for getting information and facts about a specific city. Input should be a city name."
    }

    async fn lookup(&self, city: &str) -> Result<Value, ToolError> {
        let page = match self.fetch(city).await? {
            Some(page) => page,
            None => self
                .fetch(&format!("{city} city"))
                .await?
                .ok_or_else(|| {
                    ToolError::Unavailable(format!("Could not find Wikipedia page for {city}"))
                })?,
        };
        Ok(page.into_observation())
    }
}

#[derive(Debug, Deserialize)]
struct PageSummary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: PageLink,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    page: String,
}

impl PageSummary {
    fn into_observation(self) -> Value {
        let summary: String = self.extract.chars().take(MAX_SUMMARY_CHARS).collect();
        let url = self
            .content_urls
            .map(|u| u.desktop.page)
            .unwrap_or_default();
        json!({
            "title": self.title,
            "summary": summary,
            "url": url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(base: &str) -> CityFactsTool {
        CityFactsTool::new(reqwest::Client::new(), base, 1)
    }

    #[test]
    fn summary_url_encodes_title() {
        let url = tool("https://en.wikipedia.org/api/rest_v1/")
            .summary_url("São Paulo")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/S%C3%A3o_Paulo"
        );
    }

    #[test]
    fn summary_is_capped() {
        let page: PageSummary = serde_json::from_value(json!({
            "title": "Paris",
            "extract": "a".repeat(4000),
            "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Paris"}}
        }))
        .unwrap();

        let observation = page.into_observation();
        assert_eq!(observation["title"], "Paris");
        assert_eq!(observation["summary"].as_str().unwrap().len(), MAX_SUMMARY_CHARS);
        assert_eq!(observation["url"], "https://en.wikipedia.org/wiki/Paris");
    }

    #[test]
    fn missing_links_are_tolerated() {
        let page: PageSummary = serde_json::from_value(json!({"title": "Oslo"})).unwrap();
        let observation = page.into_observation();
        assert_eq!(observation["summary"], "");
        assert_eq!(observation["url"], "");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(tool("not a url").summary_url("Paris").is_err());
    }
}
