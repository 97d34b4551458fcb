// SPDX-License-Identifier: MIT

//! Typed error handling for wayfarer
//!
//! `WorkflowError` is what the engine and the node step functions return.
//! `ModelError` covers provider-specific failures, and `WayfarerError` is the
//! top-level type used by providers, configuration loading and the CLI.

use thiserror::Error;

use crate::wayfarer::workflow::state::ThreadId;

/// Top-level error type for wayfarer
#[derive(Debug, Error)]
pub enum WayfarerError {
    /// API errors from external services (Gemini, OpenAI, Tavily, Brave, ...)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workflow engine errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Model/LLM errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Errors raised while building or driving the workflow graph
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Malformed node/edge registration, raised when the graph is compiled
    #[error("Invalid graph configuration: {0}")]
    GraphConfig(String),

    /// Operation on a thread that was never created
    #[error("Unknown thread: {0}")]
    UnknownThread(ThreadId),

    /// No snapshot with this `thread_ts` in the thread's history
    #[error("Unknown snapshot {thread_ts} in thread {thread_id}")]
    UnknownSnapshot { thread_id: ThreadId, thread_ts: String },

    /// `step` called with a node name the graph does not know
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A node's required state field is absent or empty
    #[error("Node '{node}' requires a non-empty '{field}'")]
    MissingInput { node: String, field: String },

    /// The text generation capability returned nothing usable
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A single search query failed. Logged by the research nodes, never returned.
    #[error("Search skipped for query '{query}': {reason}")]
    SearchSkipped { query: String, reason: String },
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider name not recognised
    #[error("Unsupported model provider: {0}")]
    UnsupportedProvider(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl WayfarerError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl WorkflowError {
    /// Create a missing input error
    pub fn missing_input(node: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingInput {
            node: node.into(),
            field: field.into(),
        }
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GraphConfig(_) => "GraphConfigError",
            Self::UnknownThread(_) => "UnknownThreadError",
            Self::UnknownSnapshot { .. } => "UnknownSnapshotError",
            Self::UnknownNode(_) => "UnknownNodeError",
            Self::MissingInput { .. } => "MissingInputError",
            Self::Generation(_) => "GenerationError",
            Self::SearchSkipped { .. } => "SearchSkipped",
        }
    }
}

impl From<&str> for WayfarerError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for WayfarerError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
