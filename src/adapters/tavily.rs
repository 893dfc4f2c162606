//! Tavily web search adapter.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchHit, SearchProvider};
use crate::config::Settings;
use crate::core::presets::SearchDepth;

/// Tavily search API client
pub struct TavilySearch {
    /// HTTP client
    client: reqwest::Client,
    /// API base URL
    base_url: String,
    /// API key
    api_key: String,
}

/// Response from the search endpoint
#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilySearch {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.tavily_base_url.clone(),
            settings.tavily_api_key.clone(),
            settings.request_timeout(),
        )
    }

    /// Build API URL
    fn api_url(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "query": query,
                "max_results": max_results,
                "search_depth": depth.as_str(),
            }))
            .send()
            .await
            .context("Failed to send Tavily search request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error {}: {}", status, text.trim());
        }

        let result: TavilyResponse = response
            .json()
            .await
            .context("Failed to parse Tavily response")?;

        Ok(result.results.into_iter().take(max_results).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = TavilySearch::new("https://api.tavily.com/", "KEY", Duration::from_secs(5)).unwrap();
        assert_eq!(client.api_url(), "https://api.tavily.com/search");
    }

    #[test]
    fn test_response_parsing_tolerates_extra_fields() {
        let json = r#"{
            "query": "eiffel tower",
            "results": [
                {"title": "Eiffel Tower", "url": "https://en.wikipedia.org/wiki/Eiffel_Tower", "content": "Built 1887-1889", "score": 0.98},
                {"url": "https://example.org", "content": "No score here"}
            ]
        }"#;
        let parsed: TavilyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].score, Some(0.98));
        assert_eq!(parsed.results[1].score, None);
    }
}
