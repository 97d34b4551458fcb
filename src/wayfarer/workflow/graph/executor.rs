// SPDX-License-Identifier: MIT

//! Workflow engine: drives a compiled graph over the snapshot store

use futures::stream::{self, Stream};
use std::sync::Arc;

use crate::adk::error::WorkflowError;
use crate::wayfarer::workflow::registry::CompiledGraph;
use crate::wayfarer::workflow::state::{
    PlannerState, Snapshot, StateDelta, StateStore, ThreadId, DEFAULT_MAX_REVISIONS,
};

/// Node executions per `run` call when the caller does not say
pub const DEFAULT_MAX_ITERATIONS: usize = 2;

/// Parameters of one `run` call
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Existing thread to continue; `None` starts a new one
    pub thread_id: Option<ThreadId>,
    /// Task for a new thread, or a replacement task for an existing one
    pub task: Option<String>,
    /// Extra fields merged into the state before the first node runs
    pub input: StateDelta,
    /// Stop right after any of these nodes has run
    pub stop_after: Vec<String>,
    /// Hard cap on node executions in this call
    pub max_iterations: usize,
}

impl RunRequest {
    pub fn new_thread(task: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            task: Some(task.into()),
            input: StateDelta::default(),
            stop_after: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn resume(thread_id: ThreadId) -> Self {
        Self {
            thread_id: Some(thread_id),
            task: None,
            input: StateDelta::default(),
            stop_after: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_input(mut self, input: StateDelta) -> Self {
        self.input = input;
        self
    }

    pub fn stop_after<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_after = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Progress of a `run` stream between two node executions
enum Cursor {
    Pending(RunRequest),
    Running(ActiveRun),
    Done,
}

struct ActiveRun {
    thread_id: ThreadId,
    /// Set when a finished thread restarts at the entry node; otherwise each
    /// node is read from the latest snapshot under the thread's writer
    restart_at: Option<String>,
    /// Applied with the first node only
    input: StateDelta,
    stop_after: Vec<String>,
    remaining: usize,
}

/// Runs the planning graph, one node at a time, persisting a snapshot after each
#[derive(Clone)]
pub struct WorkflowEngine {
    graph: Arc<CompiledGraph>,
    store: Arc<StateStore>,
    default_max_revisions: u32,
}

impl WorkflowEngine {
    pub fn new(graph: CompiledGraph, store: StateStore) -> Self {
        Self {
            graph: Arc::new(graph),
            store: Arc::new(store),
            default_max_revisions: DEFAULT_MAX_REVISIONS,
        }
    }

    pub fn with_default_max_revisions(mut self, max_revisions: u32) -> Self {
        self.default_max_revisions = max_revisions;
        self
    }

    /// Create a thread holding only the seeded initial state. No node runs.
    pub async fn start(&self, task: impl Into<String>, initial: StateDelta) -> Result<ThreadId, WorkflowError> {
        let max_revisions = initial.max_revisions.unwrap_or(self.default_max_revisions);
        let mut seed = PlannerState::new(task, max_revisions).to_delta();
        let task = seed.task.take();
        seed = seed.overlay(initial.caller_input());
        seed.task = task;

        let thread_id = self.store.create_thread().await;
        self.store
            .append(&thread_id, seed, None, vec![self.graph.entry_point().to_string()])
            .await?;
        log::info!("Started thread {} (max_revisions={})", thread_id, max_revisions);
        Ok(thread_id)
    }

    /// Run exactly `node_name` against the thread's latest state merged with
    /// `input`, and persist the result. Nothing is persisted on failure.
    pub async fn step(
        &self,
        thread_id: &ThreadId,
        node_name: &str,
        input: StateDelta,
    ) -> Result<Snapshot, WorkflowError> {
        let node_name = node_name.to_string();
        self.spawn_execute(thread_id, move |_| Some(node_name), input)
            .await?
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.clone()))
    }

    /// Run whatever node the thread's latest snapshot points at. `None` when
    /// the thread has already reached the end of the graph.
    async fn step_next(&self, thread_id: &ThreadId, input: StateDelta) -> Result<Option<Snapshot>, WorkflowError> {
        self.spawn_execute(thread_id, |current| current.next_node().map(str::to_string), input)
            .await
    }

    async fn spawn_execute<F>(
        &self,
        thread_id: &ThreadId,
        choose: F,
        input: StateDelta,
    ) -> Result<Option<Snapshot>, WorkflowError>
    where
        F: FnOnce(&Snapshot) -> Option<String> + Send + 'static,
    {
        // The node runs in its own task so a dropped caller cannot interrupt it
        let engine = self.clone();
        let thread_id = thread_id.clone();
        tokio::spawn(async move { engine.execute(&thread_id, choose, input).await })
            .await
            .map_err(|e| WorkflowError::generation(format!("node task aborted: {}", e)))?
    }

    /// Pick the node from the latest snapshot while holding the thread's
    /// writer, run it, and append its snapshot.
    async fn execute<F>(&self, thread_id: &ThreadId, choose: F, input: StateDelta) -> Result<Option<Snapshot>, WorkflowError>
    where
        F: FnOnce(&Snapshot) -> Option<String>,
    {
        let writer = self.store.writer(thread_id).await?;
        let current = writer
            .latest()
            .await
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.clone()))?;

        let Some(node_name) = choose(&current) else {
            return Ok(None);
        };
        let node = self
            .graph
            .node(&node_name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownNode(node_name.clone()))?;

        let input = input.caller_input();
        let state = current.state.merged(&input);

        log::info!("Executing node: {} (thread {}, step {})", node_name, thread_id, current.step + 1);
        let delta = node.run(&state).await.map_err(|e| {
            log::error!("Node {} failed on thread {}: {}", node_name, thread_id, e);
            e
        })?;

        let next_nodes = self.graph.next_nodes(&node_name, &state.merged(&delta))?;
        let snapshot = writer.append(input.overlay(delta), Some(&node_name), next_nodes).await;

        log::info!(
            "Node {} completed (thread {}, revision {}, next {:?})",
            node_name,
            thread_id,
            snapshot.state.revision_number,
            snapshot.next_nodes
        );
        Ok(Some(snapshot))
    }

    /// Walk the graph, yielding one snapshot per executed node.
    ///
    /// The stream ends when the graph reaches its end, after a node named in
    /// `stop_after`, after `max_iterations` nodes, or after the first error.
    /// Dropping the stream stops further nodes; a node already running
    /// finishes and is persisted.
    pub fn run(&self, request: RunRequest) -> impl Stream<Item = Result<Snapshot, WorkflowError>> + Send + 'static {
        let engine = self.clone();
        stream::unfold(Cursor::Pending(request), move |cursor| {
            let engine = engine.clone();
            async move { engine.advance(cursor).await }
        })
    }

    async fn advance(&self, cursor: Cursor) -> Option<(Result<Snapshot, WorkflowError>, Cursor)> {
        let mut run = match cursor {
            Cursor::Done => return None,
            Cursor::Running(run) => run,
            Cursor::Pending(request) => match self.prepare(request).await {
                Ok(Some(run)) => run,
                Ok(None) => return None,
                Err(e) => return Some((Err(e), Cursor::Done)),
            },
        };

        let input = std::mem::take(&mut run.input);
        let executed = match run.restart_at.take() {
            Some(entry) => self.step(&run.thread_id, &entry, input).await.map(Some),
            None => self.step_next(&run.thread_id, input).await,
        };
        let snapshot = match executed {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::info!("Thread {} was finished by another caller", run.thread_id);
                return None;
            }
            Err(e) => return Some((Err(e), Cursor::Done)),
        };
        run.remaining -= 1;

        let node = snapshot.last_node.clone().unwrap_or_default();
        let next = match snapshot.next_node() {
            None => {
                log::info!("Thread {} reached the end of the graph", run.thread_id);
                Cursor::Done
            }
            Some(_) if run.stop_after.contains(&node) => {
                log::info!("Thread {} paused after {}", run.thread_id, node);
                Cursor::Done
            }
            Some(_) if run.remaining == 0 => {
                log::info!("Thread {} hit the iteration cap", run.thread_id);
                Cursor::Done
            }
            Some(_) => Cursor::Running(run),
        };
        Some((Ok(snapshot), next))
    }

    /// Resolve the thread and the first node of a run. `None` means there is
    /// nothing to do.
    async fn prepare(&self, request: RunRequest) -> Result<Option<ActiveRun>, WorkflowError> {
        if request.max_iterations == 0 {
            return Ok(None);
        }

        let RunRequest {
            thread_id,
            task,
            input,
            stop_after,
            max_iterations,
        } = request;

        let (thread_id, restart_at, input) = match thread_id {
            None => {
                let task = task
                    .or_else(|| input.task.clone())
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| WorkflowError::missing_input(self.graph.entry_point(), "task"))?;
                let thread_id = self.start(task, input).await?;
                (thread_id, None, StateDelta::default())
            }
            Some(thread_id) => {
                let latest = self.store.latest(&thread_id).await?;
                let mut input = input.caller_input();
                if task.is_some() {
                    input.task = task;
                }
                let restart_at = match latest.next_node() {
                    Some(node) => {
                        log::info!("Resuming thread {} at {}", thread_id, node);
                        None
                    }
                    // A finished thread only restarts when given something new
                    None if input.is_empty() => return Ok(None),
                    None => {
                        log::info!("Restarting finished thread {}", thread_id);
                        Some(self.graph.entry_point().to_string())
                    }
                };
                (thread_id, restart_at, input)
            }
        };

        Ok(Some(ActiveRun {
            thread_id,
            restart_at,
            input,
            stop_after,
            remaining: max_iterations,
        }))
    }

    pub async fn latest(&self, thread_id: &ThreadId) -> Result<Snapshot, WorkflowError> {
        self.store.latest(thread_id).await
    }

    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Snapshot>, WorkflowError> {
        self.store.history(thread_id).await
    }

    pub async fn get(&self, thread_id: &ThreadId, thread_ts: &str) -> Result<Snapshot, WorkflowError> {
        self.store.get(thread_id, thread_ts).await
    }

    /// Copy one snapshot into a new thread and return the new thread's
    /// initial snapshot
    pub async fn branch(&self, thread_id: &ThreadId, thread_ts: &str) -> Result<Snapshot, WorkflowError> {
        let forked = self.store.fork(thread_id, thread_ts).await?;
        self.store.latest(&forked).await
    }
}
