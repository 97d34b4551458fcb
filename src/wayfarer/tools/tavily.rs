// SPDX-License-Identifier: MIT

use crate::adk::error::{ModelError, WayfarerError};
use crate::adk::search::{Search, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::env;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    content: Option<String>,
}

/// Tavily search API client
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: TAVILY_SEARCH_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, WayfarerError> {
        let api_key =
            env::var("TAVILY_API_KEY").map_err(|_| ModelError::ApiKeyMissing("tavily".to_string()))?;
        Ok(Self::new(api_key))
    }
}

/// Results without a `content` field are dropped
fn into_hits(response: TavilyResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter_map(|r| {
            r.content.map(|content| SearchHit {
                content,
                title: r.title,
                url: r.url,
            })
        })
        .collect()
}

#[async_trait]
impl Search for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, WayfarerError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let resp = self.client.post(&self.base_url).json(&body).send().await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(WayfarerError::api("Tavily", text));
        }

        let response: TavilyResponse = resp.json().await?;
        Ok(into_hits(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_hits_skips_results_without_content() {
        let response: TavilyResponse = serde_json::from_value(json!({
            "query": "rome food",
            "results": [
                { "title": "Trastevere", "url": "https://t.example", "content": "Best trattorias" },
                { "title": "Empty", "url": "https://e.example" }
            ]
        }))
        .unwrap();

        let hits = into_hits(response);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Best trattorias");
        assert_eq!(hits[0].title.as_deref(), Some("Trastevere"));
    }

    #[test]
    fn test_missing_results_field_is_empty() {
        let response: TavilyResponse = serde_json::from_value(json!({})).unwrap();
        assert!(into_hits(response).is_empty());
    }
}
