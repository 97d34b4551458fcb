// SPDX-License-Identifier: MIT

//! Application configuration
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file, then environment variables (`.env` is loaded first by
//! the binary). Command-line flags are applied on top by `main`.
//!
//! ```yaml
//! model:
//!   provider: groq
//!   name: llama-3.1-8b-instant
//!   temperature: 0.7
//! search:
//!   provider: tavily
//! server:
//!   host: 0.0.0.0
//!   port: 5000
//! workflow:
//!   max_revisions: 3
//!   max_iterations: 2
//!   thread_ids: counter
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::adk::error::{ModelError, WayfarerError};
use crate::adk::generation::{ModelGenerator, TextGeneration};
use crate::adk::model::gemini::GeminiModel;
use crate::adk::model::openai::{self, OpenAIModel};
use crate::adk::model::Model;
use crate::adk::search::Search;
use crate::wayfarer::tools::{BraveSearch, TavilySearch};
use crate::wayfarer::workflow::builder::build_vacation_graph;
use crate::wayfarer::workflow::graph::{WorkflowEngine, DEFAULT_MAX_ITERATIONS};
use crate::wayfarer::workflow::state::{
    CounterAllocator, StateStore, ThreadIdAllocator, UuidAllocator, DEFAULT_MAX_REVISIONS,
};

/// Chat model backends. Everything except Gemini speaks the OpenAI
/// chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAI,
    #[serde(alias = "google")]
    Gemini,
    #[default]
    Ollama,
    Groq,
    OpenRouter,
    Together,
}

impl ModelProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "openai",
            ModelProvider::Gemini => "gemini",
            ModelProvider::Ollama => "ollama",
            ModelProvider::Groq => "groq",
            ModelProvider::OpenRouter => "openrouter",
            ModelProvider::Together => "together",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "gpt-4o-mini",
            ModelProvider::Gemini => "gemini-1.5-flash",
            ModelProvider::Ollama => "llama3.2",
            ModelProvider::Groq => "llama-3.1-8b-instant",
            ModelProvider::OpenRouter => "google/gemini-flash-1.5-8b",
            ModelProvider::Together => "meta-llama/Llama-2-7b-chat-hf",
        }
    }

    /// Variable holding the API key; Ollama needs none
    pub fn api_key_var(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAI => Some("OPENAI_API_KEY"),
            ModelProvider::Gemini => Some("GOOGLE_API_KEY"),
            ModelProvider::Ollama => None,
            ModelProvider::Groq => Some("GROQ_API_KEY"),
            ModelProvider::OpenRouter => Some("OPENROUTER_API_KEY"),
            ModelProvider::Together => Some("TOGETHER_API_KEY"),
        }
    }

    /// Provider-specific model variable, consulted when `MODEL_NAME` is unset
    fn model_var(self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "OPENAI_MODEL",
            ModelProvider::Gemini => "GOOGLE_MODEL",
            ModelProvider::Ollama => "OLLAMA_MODEL",
            ModelProvider::Groq => "GROQ_MODEL",
            ModelProvider::OpenRouter => "OPENROUTER_MODEL",
            ModelProvider::Together => "TOGETHER_MODEL",
        }
    }

    fn base_url_var(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAI => Some("OPENAI_BASE_URL"),
            ModelProvider::Ollama => Some("OLLAMA_BASE_URL"),
            _ => None,
        }
    }

    /// OpenAI-compatible endpoint, `None` for Gemini
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAI => Some(openai::DEFAULT_BASE_URL),
            ModelProvider::Gemini => None,
            ModelProvider::Ollama => Some("http://localhost:11434/v1"),
            ModelProvider::Groq => Some("https://api.groq.com/openai/v1"),
            ModelProvider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            ModelProvider::Together => Some("https://api.together.xyz/v1"),
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = WayfarerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAI),
            "gemini" | "google" => Ok(ModelProvider::Gemini),
            "ollama" => Ok(ModelProvider::Ollama),
            "groq" => Ok(ModelProvider::Groq),
            "openrouter" => Ok(ModelProvider::OpenRouter),
            "together" => Ok(ModelProvider::Together),
            other => Err(ModelError::UnsupportedProvider(other.to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    #[default]
    Tavily,
    Brave,
}

impl SearchProvider {
    pub fn api_key_var(self) -> &'static str {
        match self {
            SearchProvider::Tavily => "TAVILY_API_KEY",
            SearchProvider::Brave => "BRAVE_API_KEY",
        }
    }
}

impl FromStr for SearchProvider {
    type Err = WayfarerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tavily" => Ok(SearchProvider::Tavily),
            "brave" => Ok(SearchProvider::Brave),
            other => Err(WayfarerError::config(format!("unknown search provider '{}'", other))),
        }
    }
}

/// How new thread ids are minted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadIdScheme {
    #[default]
    Counter,
    Uuid,
}

impl FromStr for ThreadIdScheme {
    type Err = WayfarerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "counter" => Ok(ThreadIdScheme::Counter),
            "uuid" => Ok(ThreadIdScheme::Uuid),
            other => Err(WayfarerError::config(format!("unknown thread id scheme '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    /// Falls back to the provider's default model
    pub name: Option<String>,
    /// Overrides the provider's OpenAI-compatible endpoint
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            name: None,
            base_url: None,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub provider: SearchProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub max_revisions: u32,
    /// Default cap for runs that do not set one
    pub max_iterations: usize,
    pub thread_ids: ThreadIdScheme,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_revisions: DEFAULT_MAX_REVISIONS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            thread_ids: ThreadIdScheme::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
    pub workflow: WorkflowSettings,
}

/// Presence of one credential, for `wayfarer check`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub variable: &'static str,
    pub purpose: &'static str,
    pub present: bool,
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, WayfarerError> {
    value
        .trim()
        .parse()
        .map_err(|_| WayfarerError::config(format!("{} has an invalid value '{}'", key, value)))
}

impl AppConfig {
    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, WayfarerError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_yaml(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, WayfarerError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Override fields from environment variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), WayfarerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("MODEL_TYPE").or_else(|| get("MODEL_PROVIDER")) {
            self.model.provider = provider.parse()?;
        }
        if let Some(name) = get("MODEL_NAME").or_else(|| get(self.model.provider.model_var())) {
            self.model.name = Some(name);
        }
        if let Some(url) = self.model.provider.base_url_var().and_then(&get) {
            self.model.base_url = Some(url);
        }
        if let Some(value) = get("MODEL_TEMPERATURE") {
            self.model.temperature = parse_var("MODEL_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("SEARCH_PROVIDER") {
            self.search.provider = value.parse()?;
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(value) = get("PORT") {
            self.server.port = parse_var("PORT", &value)?;
        }
        if let Some(value) = get("MAX_REVISIONS") {
            self.workflow.max_revisions = parse_var("MAX_REVISIONS", &value)?;
        }
        if let Some(value) = get("MAX_ITERATIONS") {
            self.workflow.max_iterations = parse_var("MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = get("THREAD_IDS") {
            self.workflow.thread_ids = value.parse()?;
        }
        Ok(())
    }

    pub fn model_name(&self) -> String {
        self.model
            .name
            .clone()
            .unwrap_or_else(|| self.model.provider.default_model().to_string())
    }

    fn base_url(&self) -> Option<String> {
        let provider = self.model.provider;
        match &self.model.base_url {
            // Ollama is configured with the server root
            Some(url) if provider == ModelProvider::Ollama && !url.trim_end_matches('/').ends_with("/v1") => {
                Some(format!("{}/v1", url.trim_end_matches('/')))
            }
            Some(url) => Some(url.clone()),
            None => provider.default_base_url().map(str::to_string),
        }
    }

    /// Chat model for the configured provider; keys come from `lookup`
    pub fn build_model_with<F>(&self, lookup: F) -> Result<Arc<dyn Model>, WayfarerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.model.provider;
        let api_key = provider.api_key_var().and_then(&lookup);
        if provider.api_key_var().is_some() && api_key.is_none() {
            return Err(ModelError::ApiKeyMissing(provider.to_string()).into());
        }

        let model_name = self.model_name();
        log::info!("Using provider: {} with model: {}", provider, model_name);

        match (provider, api_key, self.base_url()) {
            (ModelProvider::Gemini, Some(key), _) => Ok(Arc::new(GeminiModel::new(model_name, key))),
            (_, key, Some(base_url)) => Ok(Arc::new(OpenAIModel::new(model_name, key, base_url))),
            _ => Err(ModelError::UnsupportedProvider(provider.to_string()).into()),
        }
    }

    pub fn build_generator(&self) -> Result<Arc<dyn TextGeneration>, WayfarerError> {
        let model = self.build_model_with(|key| std::env::var(key).ok())?;
        Ok(Arc::new(
            ModelGenerator::new(self.model.provider.as_str(), model).with_temperature(self.model.temperature),
        ))
    }

    pub fn build_search(&self) -> Result<Arc<dyn Search>, WayfarerError> {
        Ok(match self.search.provider {
            SearchProvider::Tavily => Arc::new(TavilySearch::from_env()?),
            SearchProvider::Brave => Arc::new(BraveSearch::from_env()?),
        })
    }

    pub fn build_allocator(&self) -> Arc<dyn ThreadIdAllocator> {
        match self.workflow.thread_ids {
            ThreadIdScheme::Counter => Arc::new(CounterAllocator::new()),
            ThreadIdScheme::Uuid => Arc::new(UuidAllocator),
        }
    }

    /// Engine wired with the configured capabilities
    pub fn build_engine(&self) -> Result<WorkflowEngine, WayfarerError> {
        let graph = build_vacation_graph(self.build_generator()?, self.build_search()?)?;
        let store = StateStore::new(self.build_allocator());
        Ok(WorkflowEngine::new(graph, store).with_default_max_revisions(self.workflow.max_revisions))
    }

    /// Which of the credentials the configured providers need are set
    pub fn credential_report<F>(&self, lookup: F) -> Vec<CredentialStatus>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |var: &str| lookup(var).is_some_and(|v| !v.trim().is_empty());
        let mut report = Vec::new();
        if let Some(var) = self.model.provider.api_key_var() {
            report.push(CredentialStatus {
                variable: var,
                purpose: "text generation",
                present: present(var),
            });
        }
        let var = self.search.provider.api_key_var();
        report.push(CredentialStatus {
            variable: var,
            purpose: "web search",
            present: present(var),
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.model.provider, ModelProvider::Ollama);
        assert_eq!(config.model_name(), "llama3.2");
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.search.provider, SearchProvider::Tavily);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.workflow.max_revisions, 3);
        assert_eq!(config.workflow.max_iterations, 2);
        assert_eq!(config.workflow.thread_ids, ThreadIdScheme::Counter);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            r#"
model:
  provider: groq
workflow:
  max_revisions: 1
  thread_ids: uuid
"#,
        )
        .unwrap();

        assert_eq!(config.model.provider, ModelProvider::Groq);
        assert_eq!(config.model_name(), "llama-3.1-8b-instant");
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.workflow.max_revisions, 1);
        assert_eq!(config.workflow.max_iterations, 2);
        assert_eq!(config.workflow.thread_ids, ThreadIdScheme::Uuid);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_yaml_google_alias() {
        let config = AppConfig::from_yaml("model:\n  provider: google\n").unwrap();
        assert_eq!(config.model.provider, ModelProvider::Gemini);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(matches!(
            AppConfig::from_yaml("model: [unclosed"),
            Err(WayfarerError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_yaml("server:\n  port: 8080\n").unwrap();
        config
            .apply_env(env(&[
                ("MODEL_TYPE", "together"),
                ("TOGETHER_MODEL", "mistral"),
                ("PORT", "9000"),
                ("SEARCH_PROVIDER", "brave"),
                ("MAX_ITERATIONS", "6"),
            ]))
            .unwrap();

        assert_eq!(config.model.provider, ModelProvider::Together);
        assert_eq!(config.model_name(), "mistral");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.search.provider, SearchProvider::Brave);
        assert_eq!(config.workflow.max_iterations, 6);
    }

    #[test]
    fn test_model_name_beats_provider_variable() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("OLLAMA_MODEL", "qwen"), ("MODEL_NAME", "phi3")]))
            .unwrap();
        assert_eq!(config.model_name(), "phi3");
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("PORT", "http")])).is_err());
        assert!(matches!(
            config.apply_env(env(&[("MODEL_TYPE", "huggingface")])),
            Err(WayfarerError::Model(ModelError::UnsupportedProvider(_)))
        ));
    }

    #[test]
    fn test_ollama_base_url_gets_v1() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("OLLAMA_BASE_URL", "http://gpu-box:11434/")]))
            .unwrap();
        assert_eq!(config.base_url().as_deref(), Some("http://gpu-box:11434/v1"));
    }

    #[test]
    fn test_build_model_key_handling() {
        let config = AppConfig::default();
        assert!(config.build_model_with(env(&[])).is_ok());

        let mut groq = AppConfig::default();
        groq.model.provider = ModelProvider::Groq;
        assert!(matches!(
            groq.build_model_with(env(&[])),
            Err(WayfarerError::Model(ModelError::ApiKeyMissing(_)))
        ));
        assert!(groq.build_model_with(env(&[("GROQ_API_KEY", "k")])).is_ok());

        let mut gemini = AppConfig::default();
        gemini.model.provider = ModelProvider::Gemini;
        assert!(gemini.build_model_with(env(&[("GOOGLE_API_KEY", "k")])).is_ok());
    }

    #[test]
    fn test_credential_report() {
        let mut config = AppConfig::default();
        let report = config.credential_report(env(&[("TAVILY_API_KEY", "t")]));
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].variable, "TAVILY_API_KEY");
        assert!(report[0].present);

        config.model.provider = ModelProvider::OpenAI;
        let report = config.credential_report(env(&[("OPENAI_API_KEY", " ")]));
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].variable, "OPENAI_API_KEY");
        assert!(!report[0].present);
        assert!(!report[1].present);
    }

    #[test]
    fn test_allocator_scheme() {
        let mut config = AppConfig::default();
        assert_eq!(config.build_allocator().next_id().as_str(), "0");

        config.workflow.thread_ids = ThreadIdScheme::Uuid;
        assert_eq!(config.build_allocator().next_id().as_str().len(), 36);
    }
}
