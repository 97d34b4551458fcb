// SPDX-License-Identifier: MIT

//! Web search capability

use crate::adk::error::WayfarerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search result. `content` is the text the research nodes keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SearchHit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            url: None,
        }
    }
}

/// Query in, snippets out
#[async_trait]
pub trait Search: Send + Sync {
    /// Provider name, used in logs
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, WayfarerError>;
}
