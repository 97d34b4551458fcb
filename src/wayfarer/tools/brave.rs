// SPDX-License-Identifier: MIT

use crate::adk::error::{ModelError, WayfarerError};
use crate::adk::search::{Search, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::env;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

pub struct BraveSearch {
    client: Client,
    api_key: String,
}

impl BraveSearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    pub fn from_env() -> Result<Self, WayfarerError> {
        let api_key =
            env::var("BRAVE_API_KEY").map_err(|_| ModelError::ApiKeyMissing("brave".to_string()))?;
        Ok(Self::new(api_key))
    }
}

fn parse_brave_response(body: &Value) -> Result<Vec<SearchHit>, WayfarerError> {
    let results_json = body
        .get("web")
        .and_then(|w| w.get("results"))
        .ok_or_else(|| WayfarerError::api("Brave", "Invalid response format: missing web.results"))?;

    let results: Vec<BraveResult> = serde_json::from_value(results_json.clone())?;

    Ok(results
        .into_iter()
        .map(|r| SearchHit {
            content: r.description,
            title: Some(r.title),
            url: Some(r.url),
        })
        .collect())
}

#[async_trait]
impl Search for BraveSearch {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, WayfarerError> {
        let count = max_results.clamp(1, 20);

        let mut url = reqwest::Url::parse(BRAVE_SEARCH_URL)
            .map_err(|e| WayfarerError::other(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("count", &count.to_string());

        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(WayfarerError::api("Brave", text));
        }

        let body: Value = resp.json().await?;
        let mut hits = parse_brave_response(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}
