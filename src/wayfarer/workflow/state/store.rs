// SPDX-License-Identifier: MIT

//! Append-only, in-memory snapshot log per thread

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::schema::StateDelta;
use super::thread::{Snapshot, ThreadId, ThreadIdAllocator};
use crate::adk::error::WorkflowError;

#[derive(Default)]
struct ThreadLog {
    snapshots: RwLock<Vec<Snapshot>>,
    /// Held for the whole of a node execution so one thread never runs two
    /// nodes at once
    writer: Arc<Mutex<()>>,
}

/// Owns every snapshot of every thread
pub struct StateStore {
    allocator: Arc<dyn ThreadIdAllocator>,
    threads: RwLock<HashMap<ThreadId, Arc<ThreadLog>>>,
}

/// Exclusive write access to one thread. Dropping it lets the next writer in.
pub struct ThreadWriter {
    thread_id: ThreadId,
    log: Arc<ThreadLog>,
    _guard: OwnedMutexGuard<()>,
}

impl StateStore {
    pub fn new(allocator: Arc<dyn ThreadIdAllocator>) -> Self {
        Self {
            allocator,
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh thread with an empty history
    pub async fn create_thread(&self) -> ThreadId {
        let thread_id = self.allocator.next_id();
        self.threads
            .write()
            .await
            .insert(thread_id.clone(), Arc::new(ThreadLog::default()));
        log::debug!("Created thread {}", thread_id);
        thread_id
    }

    async fn thread(&self, thread_id: &ThreadId) -> Result<Arc<ThreadLog>, WorkflowError> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.clone()))
    }

    /// Wait for exclusive write access to a thread
    pub async fn writer(&self, thread_id: &ThreadId) -> Result<ThreadWriter, WorkflowError> {
        let log = self.thread(thread_id).await?;
        let guard = log.writer.clone().lock_owned().await;
        Ok(ThreadWriter {
            thread_id: thread_id.clone(),
            log,
            _guard: guard,
        })
    }

    /// Merge `delta` into the thread's latest state and record the result
    pub async fn append(
        &self,
        thread_id: &ThreadId,
        delta: StateDelta,
        last_node: Option<&str>,
        next_nodes: Vec<String>,
    ) -> Result<Snapshot, WorkflowError> {
        let writer = self.writer(thread_id).await?;
        Ok(writer.append(delta, last_node, next_nodes).await)
    }

    pub async fn latest(&self, thread_id: &ThreadId) -> Result<Snapshot, WorkflowError> {
        let log = self.thread(thread_id).await?;
        let snapshots = log.snapshots.read().await;
        snapshots
            .last()
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownThread(thread_id.clone()))
    }

    /// All snapshots of the thread, oldest first
    pub async fn history(&self, thread_id: &ThreadId) -> Result<Vec<Snapshot>, WorkflowError> {
        let log = self.thread(thread_id).await?;
        let snapshots = log.snapshots.read().await;
        Ok(snapshots.clone())
    }

    /// Look up one snapshot by its `thread_ts`
    pub async fn get(&self, thread_id: &ThreadId, thread_ts: &str) -> Result<Snapshot, WorkflowError> {
        let log = self.thread(thread_id).await?;
        let snapshots = log.snapshots.read().await;
        snapshots
            .iter()
            .find(|s| s.thread_ts == thread_ts)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownSnapshot {
                thread_id: thread_id.clone(),
                thread_ts: thread_ts.to_string(),
            })
    }

    /// Start a new thread from a copy of an existing snapshot. The source
    /// thread's history is left untouched.
    pub async fn fork(&self, thread_id: &ThreadId, thread_ts: &str) -> Result<ThreadId, WorkflowError> {
        let source = self.get(thread_id, thread_ts).await?;
        let forked = self.create_thread().await;
        self.append(
            &forked,
            source.state.to_delta(),
            source.last_node.as_deref(),
            source.next_nodes.clone(),
        )
        .await?;
        log::info!(
            "Forked thread {} at step {} into thread {}",
            thread_id,
            source.step,
            forked
        );
        Ok(forked)
    }
}

impl ThreadWriter {
    pub async fn latest(&self) -> Option<Snapshot> {
        self.log.snapshots.read().await.last().cloned()
    }

    pub async fn append(
        &self,
        delta: StateDelta,
        last_node: Option<&str>,
        next_nodes: Vec<String>,
    ) -> Snapshot {
        let mut snapshots = self.log.snapshots.write().await;

        let mut state = snapshots
            .last()
            .map(|s| s.state.clone())
            .unwrap_or_default();
        state.apply(delta);
        state.last_node = last_node.map(str::to_string);
        state.next_nodes = next_nodes.clone();

        let snapshot = Snapshot {
            thread_id: self.thread_id.clone(),
            thread_ts: uuid::Uuid::new_v4().to_string(),
            step: snapshots.len(),
            state,
            last_node: last_node.map(str::to_string),
            next_nodes,
            created_at: Utc::now(),
        };
        snapshots.push(snapshot.clone());
        snapshot
    }
}
