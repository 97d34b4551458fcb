// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{Content, GenerationConfig, Model, Part};
use crate::adk::error::{ModelError, WayfarerError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::env;

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
}

impl GeminiModel {
    pub fn new(model_name: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model_name,
        }
    }

    /// Create a new GeminiModel
    ///
    /// Requires `GOOGLE_API_KEY` environment variable to be set.
    pub fn from_env(model_name: String) -> Result<Self, WayfarerError> {
        let api_key = env::var("GOOGLE_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing("gemini".to_string()))?;
        Ok(Self::new(model_name, api_key))
    }
}

/// Build the generateContent request body. System messages become the
/// `systemInstruction`, everything else goes into `contents`.
fn build_request_body(history: &[Content], config: Option<&GenerationConfig>) -> serde_json::Value {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for c in history {
        let parts: Vec<serde_json::Value> = c.parts.iter().filter_map(part_to_gemini_json).collect();
        if c.role == "system" {
            system_parts.extend(parts);
        } else {
            contents.push(json!({ "role": c.role, "parts": parts }));
        }
    }

    let mut body = json!({ "contents": contents });

    if !system_parts.is_empty() {
        body["systemInstruction"] = json!({ "parts": system_parts });
    }

    if let Some(cfg) = config {
        let mut generation = serde_json::Map::new();
        if let Some(temp) = cfg.temperature {
            generation.insert("temperature".into(), json!(temp));
        }
        if let Some(schema) = &cfg.response_schema {
            generation.insert("responseMimeType".into(), json!("application/json"));
            generation.insert("responseSchema".into(), schema.clone());
        }
        if !generation.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation);
        }
    }

    body
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, WayfarerError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, self.api_key
        );

        let body = build_request_body(history, config);

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited {
                retry_after_secs: None,
            }
            .into());
        }

        if !resp.status().is_success() {
            let text = resp.text().await?;
            return Err(WayfarerError::api("Gemini", text));
        }

        let resp_json: serde_json::Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        parse_gemini_response(&resp_json)
    }
}

fn parse_gemini_response(resp_json: &serde_json::Value) -> Result<Content, WayfarerError> {
    let candidate = resp_json["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ModelError::InvalidResponse("No candidates in response".into()))?;

    if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        log::debug!("Gemini finish reason: {}", finish_reason);
        if finish_reason == "SAFETY" {
            return Err(ModelError::InvalidResponse(
                "Gemini blocked response due to safety filters.".into(),
            )
            .into());
        }
    }

    let parts_json = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            log::error!("No parts in candidate. Full response: {}", resp_json);
            ModelError::InvalidResponse(format!("No content in Gemini response: {}", candidate))
        })?;

    Ok(Content {
        role: "model".to_string(),
        parts: parts_json.iter().flat_map(parse_gemini_part).collect(),
    })
}

/// Serialize a Part to Gemini API JSON format
/// Returns None for parts that shouldn't be sent (e.g., Thinking)
pub fn part_to_gemini_json(part: &Part) -> Option<serde_json::Value> {
    match part {
        Part::Text(t) => Some(json!({ "text": t })),
        Part::Thinking(_) => None, // Thinking is internal, not sent to API
    }
}

/// Parse a Gemini API JSON part into parts
pub fn parse_gemini_part(p: &serde_json::Value) -> Vec<Part> {
    let mut parts = Vec::new();

    if let Some(thought) = p.get("thought").and_then(|t| t.as_str()) {
        if !thought.is_empty() {
            parts.push(Part::Thinking(thought.to_string()));
        }
    }

    if let Some(text) = p["text"].as_str() {
        // Thinking models flag reasoning text with `"thought": true`
        if p.get("thought").and_then(|t| t.as_bool()) == Some(true) {
            parts.push(Part::Thinking(text.to_string()));
        } else {
            parts.push(Part::Text(text.to_string()));
        }
    }

    parts
}
