// SPDX-License-Identifier: MIT

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;

use super::errors::{AppError, ErrorResponse};
use super::AppState;
use crate::wayfarer::workflow::graph::RunRequest;
use crate::wayfarer::workflow::nodes::{GENERATE, PLANNER, REFLECT, RESEARCH_PLAN};
use crate::wayfarer::workflow::state::{PlannerState, Snapshot, StateDelta, ThreadId};

/// Wire form of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotView {
    pub thread_id: ThreadId,
    pub thread_ts: String,
    pub step: usize,
    pub last_node: Option<String>,
    pub next_nodes: Vec<String>,
    pub revision_number: u32,
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub state: PlannerState,
}

impl From<Snapshot> for SnapshotView {
    fn from(s: Snapshot) -> Self {
        Self {
            revision_number: s.state.revision_number,
            count: s.state.count,
            thread_id: s.thread_id,
            thread_ts: s.thread_ts,
            step: s.step,
            last_node: s.last_node,
            next_nodes: s.next_nodes,
            created_at: s.created_at,
            state: s.state,
        }
    }
}

pub async fn index() -> Json<Value> {
    Json(json!({ "service": "wayfarer", "status": "running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct StreamRunRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    /// Force a new thread even when `thread_id` is given
    #[serde(default)]
    pub start: Option<bool>,
    #[serde(default)]
    pub stop_after: Vec<String>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Extra state fields merged before the first node runs
    #[serde(default)]
    pub input: StateDelta,
}

/// Multi-step run, streamed as one JSON object per line
pub async fn stream_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StreamRunRequest>,
) -> Result<Response, AppError> {
    let max_iterations = req.max_iterations.unwrap_or(state.max_iterations);
    let thread_id = match (req.start, req.thread_id) {
        (Some(true), _) | (None, None) => None,
        (Some(false), None) => return Err(AppError::BadRequest("thread_id is required".to_string())),
        (_, Some(thread_id)) => Some(thread_id),
    };

    let request = match thread_id {
        None => {
            let task = req.task.filter(|t| !t.trim().is_empty());
            let Some(task) = task else {
                return Err(AppError::BadRequest("task is required".to_string()));
            };
            RunRequest::new_thread(task)
        }
        Some(thread_id) => {
            // Surface a bad thread id as a status code rather than an in-stream error
            state.engine.latest(&thread_id).await?;
            let mut request = RunRequest::resume(thread_id);
            request.task = req.task.filter(|t| !t.trim().is_empty());
            request
        }
    }
    .with_input(req.input)
    .stop_after(req.stop_after)
    .max_iterations(max_iterations);

    let lines = state.engine.run(request).map(|item| {
        let mut line = match item {
            Ok(snapshot) => serde_json::to_vec(&SnapshotView::from(snapshot)),
            Err(err) => serde_json::to_vec(&ErrorResponse::from_workflow(&err)),
        }
        .unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e).into_bytes());
        line.push(b'\n');
        Ok::<_, Infallible>(Bytes::from(line))
    });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

/// Body of the single-node endpoints: a thread plus state fields to merge
#[derive(Debug, Deserialize)]
pub struct NodeRequest {
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(flatten)]
    pub fields: StateDelta,
}

impl NodeRequest {
    fn thread_id(&self) -> Result<ThreadId, AppError> {
        self.thread_id
            .clone()
            .ok_or_else(|| AppError::BadRequest("thread_id is required".to_string()))
    }
}

/// Start a thread and run the planner on it
pub async fn plan(State(state): State<Arc<AppState>>, Json(req): Json<NodeRequest>) -> Result<Json<Value>, AppError> {
    let task = req.fields.task.clone().unwrap_or_default();
    if task.trim().is_empty() {
        return Err(AppError::BadRequest("task is required".to_string()));
    }

    let thread_id = state.engine.start(task, req.fields).await?;
    let snapshot = state
        .engine
        .step(&thread_id, PLANNER, StateDelta::default())
        .await
        .map_err(AppError::on_thread(thread_id.clone()))?;

    Ok(Json(json!({
        "plan": snapshot.state.plan,
        "thread_id": snapshot.thread_id,
        "thread_ts": snapshot.thread_ts,
    })))
}

pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.engine.step(&req.thread_id()?, RESEARCH_PLAN, req.fields).await?;
    Ok(Json(json!({
        "queries": snapshot.state.queries,
        "answers": snapshot.state.answers,
        "thread_id": snapshot.thread_id,
        "thread_ts": snapshot.thread_ts,
    })))
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.engine.step(&req.thread_id()?, GENERATE, req.fields).await?;
    Ok(Json(json!({
        "draft": snapshot.state.draft,
        "revision_number": snapshot.state.revision_number,
        "next_nodes": snapshot.next_nodes,
        "thread_id": snapshot.thread_id,
        "thread_ts": snapshot.thread_ts,
    })))
}

pub async fn critique(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NodeRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.engine.step(&req.thread_id()?, REFLECT, req.fields).await?;
    Ok(Json(json!({
        "critique": snapshot.state.critique,
        "thread_id": snapshot.thread_id,
        "thread_ts": snapshot.thread_ts,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub thread_id: Option<ThreadId>,
    pub thread_ts: Option<String>,
}

impl StateQuery {
    fn thread_id(&self) -> Result<ThreadId, AppError> {
        self.thread_id
            .clone()
            .ok_or_else(|| AppError::BadRequest("thread_id required".to_string()))
    }
}

/// Latest snapshot, or the one named by `thread_ts`
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> Result<Json<SnapshotView>, AppError> {
    let thread_id = query.thread_id()?;
    let snapshot = match &query.thread_ts {
        Some(thread_ts) => state.engine.get(&thread_id, thread_ts).await?,
        None => state.engine.latest(&thread_id).await?,
    };
    Ok(Json(snapshot.into()))
}

pub async fn get_state_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateQuery>,
) -> Result<Json<Value>, AppError> {
    let history: Vec<SnapshotView> = state
        .engine
        .history(&query.thread_id()?)
        .await?
        .into_iter()
        .map(SnapshotView::from)
        .collect();
    Ok(Json(json!({ "history": history })))
}

#[derive(Debug, Deserialize)]
pub struct BranchRequest {
    pub thread_id: ThreadId,
    pub thread_ts: String,
}

/// Copy a snapshot into a new thread
pub async fn branch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BranchRequest>,
) -> Result<Json<SnapshotView>, AppError> {
    let snapshot = state.engine.branch(&req.thread_id, &req.thread_ts).await?;
    Ok(Json(snapshot.into()))
}
