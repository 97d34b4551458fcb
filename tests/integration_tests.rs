//! Integration tests for the planning workflow
//!
//! These drive the whole stack (model adapter, nodes, graph, engine and
//! snapshot store) with mock model and search providers.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wayfarer::adk::error::{WayfarerError, WorkflowError};
use wayfarer::adk::generation::ModelGenerator;
use wayfarer::adk::model::{Content, GenerationConfig, Model, Part};
use wayfarer::adk::search::{Search, SearchHit};
use wayfarer::wayfarer::workflow::builder::build_vacation_graph;
use wayfarer::wayfarer::workflow::graph::{RunRequest, WorkflowEngine};
use wayfarer::wayfarer::workflow::state::{
    is_extension_of, CounterAllocator, Snapshot, StateDelta, StateStore, ThreadId, UuidAllocator,
};

const ROME: &str = "Plan a 3-day trip to Rome";

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model: JSON query lists for structured requests, numbered text otherwise
struct MockModel {
    calls: AtomicUsize,
    empty_at_call: Option<usize>,
}

impl MockModel {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            empty_at_call: None,
        }
    }

    fn empty_at(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            empty_at_call: Some(call),
        }
    }

    fn text_response(text: String) -> Content {
        Content {
            role: "model".to_string(),
            parts: vec![Part::Thinking("considering".to_string()), Part::Text(text)],
        }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_content(
        &self,
        _history: &[Content],
        config: Option<&GenerationConfig>,
    ) -> Result<Content, WayfarerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.empty_at_call == Some(n) {
            return Ok(MockModel::text_response(String::new()));
        }

        let structured = config.is_some_and(|c| c.response_schema.is_some());
        if structured {
            // Some providers fence JSON even when asked for a schema
            Ok(MockModel::text_response(format!(
                "```json\n{{\"queries\": [\"q{n}a\", \"q{n}b\", \"q{n}c\", \"q{n}d\"]}}\n```"
            )))
        } else {
            Ok(MockModel::text_response(format!("text {}", n)))
        }
    }
}

/// Mock search that fails for every query ending in `b`
struct MockSearch {
    calls: AtomicUsize,
}

#[async_trait]
impl Search for MockSearch {
    fn name(&self) -> &str {
        "mock_search"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, WayfarerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.ends_with('b') {
            return Err(WayfarerError::api("mock_search", "quota exceeded"));
        }
        Ok((0..max_results)
            .map(|i| SearchHit::new(format!("{} result {}", query, i)))
            .collect())
    }
}

fn engine_with(model: MockModel) -> (WorkflowEngine, Arc<MockSearch>) {
    let generator = Arc::new(ModelGenerator::new("mock", Arc::new(model)));
    let search = Arc::new(MockSearch {
        calls: AtomicUsize::new(0),
    });
    let graph = build_vacation_graph(generator, search.clone()).expect("graph should compile");
    let engine = WorkflowEngine::new(graph, StateStore::new(Arc::new(CounterAllocator::new())));
    (engine, search)
}

async fn run_all(engine: &WorkflowEngine, request: RunRequest) -> Vec<Result<Snapshot, WorkflowError>> {
    engine.run(request).collect().await
}

fn last_nodes(items: &[Result<Snapshot, WorkflowError>]) -> Vec<&str> {
    items
        .iter()
        .map(|item| item.as_ref().unwrap().last_node.as_deref().unwrap())
        .collect()
}

// ============================================================================
// Full runs
// ============================================================================

#[tokio::test]
async fn test_rome_scenario_five_steps() {
    let (engine, search) = engine_with(MockModel::new());
    let items = run_all(&engine, RunRequest::new_thread(ROME).max_iterations(5)).await;

    assert_eq!(
        last_nodes(&items),
        vec!["planner", "research_plan", "generate", "reflect", "research_critique"]
    );

    let snapshots: Vec<Snapshot> = items.into_iter().map(Result::unwrap).collect();
    assert_eq!(snapshots[2].state.revision_number, 1);
    assert_eq!(snapshots[2].next_nodes, vec!["reflect"]);
    assert_eq!(snapshots[0].state.plan, "text 0");

    // Two research rounds of 3 kept queries each; the `b` query fails both times
    assert_eq!(snapshots[4].state.queries.len(), 6);
    assert_eq!(snapshots[4].state.answers.len(), 4 * 3);
    assert_eq!(search.calls.load(Ordering::SeqCst), 6);

    for pair in snapshots.windows(2) {
        assert!(is_extension_of(&pair[0].state.queries, &pair[1].state.queries));
        assert!(is_extension_of(&pair[0].state.answers, &pair[1].state.answers));
    }
}

#[tokio::test]
async fn test_full_run_reaches_end_after_max_revisions() {
    let (engine, _) = engine_with(MockModel::new());
    let items = run_all(&engine, RunRequest::new_thread(ROME).max_iterations(100)).await;

    // planner, research_plan, then (generate, reflect, research_critique) x2, then generate
    assert_eq!(items.len(), 2 + 3 * 2 + 1);
    let last = items.last().unwrap().as_ref().unwrap();
    assert_eq!(last.last_node.as_deref(), Some("generate"));
    assert_eq!(last.state.revision_number, 3);
    assert!(last.is_terminal());
    assert_eq!(last.state.count, items.len() as u32);

    let history = engine.history(&last.thread_id).await.unwrap();
    assert_eq!(history.len(), items.len() + 1);
    for (i, snapshot) in history.iter().enumerate() {
        assert_eq!(snapshot.step, i);
    }
}

#[tokio::test]
async fn test_empty_generation_stops_run_and_keeps_history() {
    // Call 2 is the first `generate`
    let (engine, _) = engine_with(MockModel::empty_at(2));
    let items = run_all(&engine, RunRequest::new_thread(ROME).max_iterations(5)).await;

    assert_eq!(items.len(), 3);
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), "GenerationError");

    let thread_id = items[0].as_ref().unwrap().thread_id.clone();
    let latest = engine.latest(&thread_id).await.unwrap();
    assert_eq!(latest.last_node.as_deref(), Some("research_plan"));
    assert_eq!(latest.next_nodes, vec!["generate"]);

    // Retrying picks up where the failure happened
    let retry = run_all(&engine, RunRequest::resume(thread_id).max_iterations(1)).await;
    assert_eq!(last_nodes(&retry), vec!["generate"]);
}

// ============================================================================
// Single steps
// ============================================================================

#[tokio::test]
async fn test_step_generate_without_plan() {
    let (engine, _) = engine_with(MockModel::new());
    let thread_id = engine.start(ROME, StateDelta::default()).await.unwrap();

    let result = engine.step(&thread_id, "generate", StateDelta::default()).await;
    match result {
        Err(WorkflowError::MissingInput { node, field }) => {
            assert_eq!(node, "generate");
            assert_eq!(field, "plan");
        }
        other => panic!("expected MissingInput, got {:?}", other),
    }
    assert_eq!(engine.history(&thread_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_research_step_skips_failing_query() {
    let (engine, search) = engine_with(MockModel::new());
    let thread_id = engine.start(ROME, StateDelta::default()).await.unwrap();

    let input = StateDelta {
        plan: Some("See the Colosseum".to_string()),
        ..Default::default()
    };
    let snapshot = engine.step(&thread_id, "research_plan", input).await.unwrap();

    assert_eq!(snapshot.state.queries, vec!["q0a", "q0b", "q0c"]);
    assert_eq!(search.calls.load(Ordering::SeqCst), 3);
    assert_eq!(snapshot.state.answers.len(), 6);
    assert!(snapshot.state.answers.iter().all(|a| !a.starts_with("q0b")));
    assert_eq!(snapshot.state.plan, "See the Colosseum");
}

#[tokio::test]
async fn test_unknown_thread() {
    let (engine, _) = engine_with(MockModel::new());
    let ghost = ThreadId::from("does-not-exist");

    assert!(matches!(engine.latest(&ghost).await, Err(WorkflowError::UnknownThread(_))));
    assert!(matches!(
        engine.step(&ghost, "planner", StateDelta::default()).await,
        Err(WorkflowError::UnknownThread(_))
    ));
}

// ============================================================================
// Threads
// ============================================================================

#[tokio::test]
async fn test_parallel_threads_are_isolated() {
    let generator = Arc::new(ModelGenerator::new("mock", Arc::new(MockModel::new())));
    let search = Arc::new(MockSearch {
        calls: AtomicUsize::new(0),
    });
    let graph = build_vacation_graph(generator, search).unwrap();
    let engine = WorkflowEngine::new(graph, StateStore::new(Arc::new(UuidAllocator)));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let request = RunRequest::new_thread(format!("Trip {}", i)).max_iterations(3);
                engine.run(request).collect::<Vec<_>>().await
            })
        })
        .collect();

    let mut threads = HashSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let items = handle.await.unwrap();
        assert_eq!(items.len(), 3);
        let snapshots: Vec<Snapshot> = items.into_iter().map(Result::unwrap).collect();
        assert!(snapshots.iter().all(|s| s.thread_id == snapshots[0].thread_id));
        assert!(snapshots.iter().all(|s| s.state.task == format!("Trip {}", i)));
        assert_eq!(snapshots[2].state.revision_number, 1);
        threads.insert(snapshots[0].thread_id.clone());
    }
    assert_eq!(threads.len(), 4);
}

#[tokio::test]
async fn test_branch_then_diverge() {
    let (engine, _) = engine_with(MockModel::new());
    let items = run_all(&engine, RunRequest::new_thread(ROME).max_iterations(3)).await;
    let drafted = items[2].as_ref().unwrap().clone();

    let branch = engine.branch(&drafted.thread_id, &drafted.thread_ts).await.unwrap();
    assert_eq!(branch.state.draft, drafted.state.draft);
    assert_eq!(branch.state.revision_number, 1);

    let more = run_all(&engine, RunRequest::resume(branch.thread_id.clone()).max_iterations(2)).await;
    assert_eq!(last_nodes(&more), vec!["reflect", "research_critique"]);

    // The source thread did not move
    let source = engine.latest(&drafted.thread_id).await.unwrap();
    assert_eq!(source.thread_ts, drafted.thread_ts);
}
