// SPDX-License-Identifier: MIT

//! Text generation capability
//!
//! Workflow nodes only see [`TextGeneration`]. [`ModelGenerator`] adapts any
//! [`Model`] to it: one system instruction, one user message, one reply.

use crate::adk::error::WorkflowError;
use crate::adk::model::{Content, GenerationConfig, Model};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Prompt in, text out
#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Generate free text. Empty replies are a `Generation` error.
    async fn generate(&self, system_instruction: &str, content: &str) -> Result<String, WorkflowError>;

    /// Generate a JSON document conforming to `schema`.
    async fn generate_structured(
        &self,
        system_instruction: &str,
        content: &str,
        schema: &Value,
    ) -> Result<Value, WorkflowError>;
}

/// [`TextGeneration`] backed by a chat model
pub struct ModelGenerator {
    name: String,
    model: Arc<dyn Model>,
    temperature: Option<f32>,
}

impl ModelGenerator {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>) -> Self {
        Self {
            name: name.into(),
            model,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    async fn complete(
        &self,
        system_instruction: &str,
        content: &str,
        response_schema: Option<&Value>,
    ) -> Result<String, WorkflowError> {
        let history = [Content::system(system_instruction), Content::user(content)];
        let config = GenerationConfig {
            temperature: self.temperature,
            response_schema: response_schema.cloned(),
            ..Default::default()
        };

        let response = self
            .model
            .generate_content(&history, Some(&config))
            .await
            .map_err(|e| WorkflowError::generation(format!("{}: {}", self.name, e)))?;

        let text = response.text();
        if text.trim().is_empty() {
            log::warn!("Generator {} received an empty response", self.name);
            return Err(WorkflowError::generation(format!(
                "{} returned empty content",
                self.name
            )));
        }

        log::info!(
            "Generator {} returned {} chars (preview: '{}')",
            self.name,
            text.len(),
            preview(&text, 100)
        );
        Ok(text)
    }
}

#[async_trait]
impl TextGeneration for ModelGenerator {
    async fn generate(&self, system_instruction: &str, content: &str) -> Result<String, WorkflowError> {
        self.complete(system_instruction, content, None).await
    }

    async fn generate_structured(
        &self,
        system_instruction: &str,
        content: &str,
        schema: &Value,
    ) -> Result<Value, WorkflowError> {
        let text = self.complete(system_instruction, content, Some(schema)).await?;
        parse_json_reply(&text)
    }
}

/// Parse a model reply as JSON. Models without native structured output
/// tend to wrap the document in a ```json fence.
pub fn parse_json_reply(text: &str) -> Result<Value, WorkflowError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| WorkflowError::generation(format!("structured output is not valid JSON: {}", e)))
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
