// SPDX-License-Identifier: MIT

//! The five vacation-planning steps
//!
//! Each node reads the merged state, calls the injected capabilities and
//! returns a [`StateDelta`]. Sequence fields are returned in full: a node that
//! researches returns the previous `queries`/`answers` with its own appended.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::adk::error::WorkflowError;
use crate::adk::generation::TextGeneration;
use crate::adk::search::Search;
use crate::wayfarer::workflow::prompts::{self, render};
use crate::wayfarer::workflow::registry::{Node, END};
use crate::wayfarer::workflow::state::{PlannerState, StateDelta};

pub const PLANNER: &str = "planner";
pub const RESEARCH_PLAN: &str = "research_plan";
pub const GENERATE: &str = "generate";
pub const REFLECT: &str = "reflect";
pub const RESEARCH_CRITIQUE: &str = "research_critique";

/// Queries kept from one structured generation
pub const MAX_QUERIES: usize = 3;
/// Search hits requested per query
pub const RESULTS_PER_QUERY: usize = 3;

const ANSWER_SEPARATOR: &str = "\n------\n";
const NO_RESEARCH: &str = "No research data available.";

/// Structured reply of the research nodes
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryList {
    /// Web search queries, most useful first
    pub queries: Vec<String>,
}

static QUERY_LIST_SCHEMA: Lazy<Value> = Lazy::new(|| {
    let mut schema = serde_json::to_value(schemars::schema_for!(QueryList)).unwrap_or_else(|_| {
        json!({
            "type": "object",
            "properties": { "queries": { "type": "array", "items": { "type": "string" } } },
            "required": ["queries"]
        })
    });
    // Provider schema dialects reject the meta keys
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
});

/// JSON schema sent with structured query requests
pub fn query_list_schema() -> &'static Value {
    &QUERY_LIST_SCHEMA
}

/// Branch key for the edge leaving `generate`
pub fn should_continue(state: &PlannerState) -> String {
    if state.revision_number >= state.max_revisions {
        END.to_string()
    } else {
        REFLECT.to_string()
    }
}

fn require<'a>(node: &str, field: &str, value: &'a str) -> Result<&'a str, WorkflowError> {
    if value.trim().is_empty() {
        Err(WorkflowError::missing_input(node, field))
    } else {
        Ok(value)
    }
}

fn bump_count(state: &PlannerState) -> Option<u32> {
    Some(state.count + 1)
}

/// Shared query-then-search routine of the two research nodes
struct Researcher {
    generator: Arc<dyn TextGeneration>,
    search: Arc<dyn Search>,
}

impl Researcher {
    async fn research(
        &self,
        node: &str,
        instruction: &str,
        content: &str,
        state: &PlannerState,
    ) -> Result<StateDelta, WorkflowError> {
        let reply = self
            .generator
            .generate_structured(instruction, content, query_list_schema())
            .await?;
        let list: QueryList = serde_json::from_value(reply)
            .map_err(|e| WorkflowError::generation(format!("{}: malformed query list: {}", node, e)))?;

        let new_queries: Vec<String> = list
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_QUERIES)
            .collect();
        log::info!("[{}] Researching {} queries", node, new_queries.len());

        let mut answers = state.answers.clone();
        for query in &new_queries {
            match self.search.search(query, RESULTS_PER_QUERY).await {
                Ok(hits) => {
                    log::debug!("[{}] '{}' returned {} hits", node, query, hits.len());
                    answers.extend(hits.into_iter().map(|hit| hit.content));
                }
                Err(e) => {
                    let skipped = WorkflowError::SearchSkipped {
                        query: query.clone(),
                        reason: e.to_string(),
                    };
                    log::warn!("[{}] {} ({})", node, skipped, self.search.name());
                }
            }
        }

        let mut queries = state.queries.clone();
        queries.extend(new_queries);

        Ok(StateDelta {
            queries: Some(queries),
            answers: Some(answers),
            count: bump_count(state),
            ..Default::default()
        })
    }
}

/// Outlines what the itinerary must consider
pub struct PlannerNode {
    generator: Arc<dyn TextGeneration>,
}

impl PlannerNode {
    pub fn new(generator: Arc<dyn TextGeneration>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node for PlannerNode {
    fn name(&self) -> &str {
        PLANNER
    }

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError> {
        let task = require(PLANNER, "task", &state.task)?;
        let plan = self.generator.generate(prompts::SUPERVISOR, task).await?;
        Ok(StateDelta {
            plan: Some(plan),
            count: bump_count(state),
            ..Default::default()
        })
    }
}

/// Searches the web for material backing the outline
pub struct ResearchPlanNode {
    researcher: Researcher,
}

impl ResearchPlanNode {
    pub fn new(generator: Arc<dyn TextGeneration>, search: Arc<dyn Search>) -> Self {
        Self {
            researcher: Researcher { generator, search },
        }
    }
}

#[async_trait]
impl Node for ResearchPlanNode {
    fn name(&self) -> &str {
        RESEARCH_PLAN
    }

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError> {
        let plan = require(RESEARCH_PLAN, "plan", &state.plan)?;
        self.researcher
            .research(RESEARCH_PLAN, prompts::PLAN_RESEARCHER, plan, state)
            .await
    }
}

/// Writes (or rewrites) the itinerary draft
pub struct GenerateNode {
    generator: Arc<dyn TextGeneration>,
}

impl GenerateNode {
    pub fn new(generator: Arc<dyn TextGeneration>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node for GenerateNode {
    fn name(&self) -> &str {
        GENERATE
    }

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError> {
        let task = require(GENERATE, "task", &state.task)?;
        let plan = require(GENERATE, "plan", &state.plan)?;

        let research = if state.answers.is_empty() {
            NO_RESEARCH.to_string()
        } else {
            state.answers.join(ANSWER_SEPARATOR)
        };
        let instruction = render(prompts::ITINERARY_WRITER, &[("answers", &research)]);
        let content = format!("{}\n\nHere is my plan:\n\n{}", task, plan);

        let draft = self.generator.generate(&instruction, &content).await?;
        Ok(StateDelta {
            draft: Some(draft),
            revision_number: Some(state.revision_number + 1),
            count: bump_count(state),
            ..Default::default()
        })
    }
}

/// Critiques the current draft
pub struct ReflectNode {
    generator: Arc<dyn TextGeneration>,
}

impl ReflectNode {
    pub fn new(generator: Arc<dyn TextGeneration>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node for ReflectNode {
    fn name(&self) -> &str {
        REFLECT
    }

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError> {
        let draft = require(REFLECT, "draft", &state.draft)?;
        let critique = self.generator.generate(prompts::CRITIC, draft).await?;
        Ok(StateDelta {
            critique: Some(critique),
            count: bump_count(state),
            ..Default::default()
        })
    }
}

/// Searches for what the critique asks to revise
pub struct ResearchCritiqueNode {
    researcher: Researcher,
}

impl ResearchCritiqueNode {
    pub fn new(generator: Arc<dyn TextGeneration>, search: Arc<dyn Search>) -> Self {
        Self {
            researcher: Researcher { generator, search },
        }
    }
}

#[async_trait]
impl Node for ResearchCritiqueNode {
    fn name(&self) -> &str {
        RESEARCH_CRITIQUE
    }

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError> {
        let critique = require(RESEARCH_CRITIQUE, "critique", &state.critique)?;
        let instruction = render(
            prompts::CRITIQUE_RESEARCHER,
            &[
                ("queries", &bullets(&state.queries)),
                ("answers", &bullets(&state.answers)),
            ],
        );
        self.researcher
            .research(RESEARCH_CRITIQUE, &instruction, critique, state)
            .await
    }
}

fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
