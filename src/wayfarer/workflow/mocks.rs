// SPDX-License-Identifier: MIT

//! Scripted capability providers for unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::adk::error::{WayfarerError, WorkflowError};
use crate::adk::generation::TextGeneration;
use crate::adk::search::{Search, SearchHit};

/// Answers every prompt with a numbered reply and every structured request
/// with the configured queries.
pub struct MockGenerator {
    queries: Vec<String>,
    calls: AtomicUsize,
    fail_at_call: Option<usize>,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    pub fn new(queries: &[&str]) -> Self {
        Self {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            calls: AtomicUsize::new(0),
            fail_at_call: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail the n-th call (0-based), counting both kinds of request
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at_call = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, system_instruction: &str, content: &str) -> Result<usize, WorkflowError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), content.to_string()));
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at_call == Some(n) {
            return Err(WorkflowError::generation("mock provider is down"));
        }
        Ok(n)
    }
}

#[async_trait]
impl TextGeneration for MockGenerator {
    async fn generate(&self, system_instruction: &str, content: &str) -> Result<String, WorkflowError> {
        let n = self.record(system_instruction, content)?;
        Ok(format!("reply {}", n))
    }

    async fn generate_structured(
        &self,
        system_instruction: &str,
        content: &str,
        _schema: &Value,
    ) -> Result<Value, WorkflowError> {
        self.record(system_instruction, content)?;
        Ok(json!({ "queries": self.queries }))
    }
}

/// Returns `max_results` hits per query, or an error for queries listed as failing
pub struct MockSearch {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Search for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, WayfarerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(query) {
            return Err(WayfarerError::api("mock", "search backend unavailable"));
        }
        Ok((0..max_results)
            .map(|i| SearchHit::new(format!("{} #{}", query, i)))
            .collect())
    }
}
