// SPDX-License-Identifier: MIT

//! Thread identifiers and snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

use super::schema::PlannerState;

/// Opaque identifier of one independent run of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Mints process-unique thread identifiers
pub trait ThreadIdAllocator: Send + Sync {
    fn next_id(&self) -> ThreadId;
}

/// Sequential ids `0`, `1`, `2`, ...
#[derive(Debug, Default)]
pub struct CounterAllocator {
    next: Mutex<u64>,
}

impl CounterAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Mutex::new(first),
        }
    }
}

impl ThreadIdAllocator for CounterAllocator {
    fn next_id(&self) -> ThreadId {
        // The counter stays consistent even if a holder panicked
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next;
        *next += 1;
        ThreadId(id.to_string())
    }
}

/// Random v4 UUIDs
#[derive(Debug, Default)]
pub struct UuidAllocator;

impl ThreadIdAllocator for UuidAllocator {
    fn next_id(&self) -> ThreadId {
        ThreadId(uuid::Uuid::new_v4().to_string())
    }
}

/// Immutable record of the state after one node execution (or the
/// synthetic initial state of a thread).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub thread_id: ThreadId,
    /// Distinguishes this snapshot within its thread
    pub thread_ts: String,
    /// 0-based position in the thread's history
    pub step: usize,
    pub state: PlannerState,
    pub last_node: Option<String>,
    /// Candidate next nodes; empty once the graph reached its end
    pub next_nodes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn is_terminal(&self) -> bool {
        self.next_nodes.is_empty()
    }

    /// The node the graph would run next, if any
    pub fn next_node(&self) -> Option<&str> {
        self.next_nodes.first().map(String::as_str)
    }
}
