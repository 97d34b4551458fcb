// SPDX-License-Identifier: MIT

//! State record shared by the workflow nodes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Revision budget used when the caller does not set one
pub const DEFAULT_MAX_REVISIONS: u32 = 3;

/// Full workflow state. Absent fields deserialize to empty/zero; unknown
/// fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerState {
    pub task: String,
    pub plan: String,
    pub draft: String,
    pub critique: String,
    /// Append-only across the life of a thread
    pub queries: Vec<String>,
    /// Append-only across the life of a thread
    pub answers: Vec<String>,
    /// Only the `generate` node increments this
    pub revision_number: u32,
    pub max_revisions: u32,
    pub count: u32,
    /// Node that produced the snapshot holding this state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_node: Option<String>,
    /// Nodes the graph runs next; empty once the thread is finished
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_nodes: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partial update returned by a node or supplied by a caller.
///
/// Every present field overwrites the current value. Sequences are replaced
/// wholesale, so a node extending `queries` returns the full extended list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_revisions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PlannerState {
    /// Seed state for a new thread
    pub fn new(task: impl Into<String>, max_revisions: u32) -> Self {
        Self {
            task: task.into(),
            max_revisions,
            ..Default::default()
        }
    }

    /// Shallow merge: present fields in `delta` overwrite.
    pub fn apply(&mut self, delta: StateDelta) {
        let StateDelta {
            task,
            plan,
            draft,
            critique,
            queries,
            answers,
            revision_number,
            max_revisions,
            count,
            extra,
        } = delta;

        overwrite(&mut self.task, task);
        overwrite(&mut self.plan, plan);
        overwrite(&mut self.draft, draft);
        overwrite(&mut self.critique, critique);
        overwrite(&mut self.queries, queries);
        overwrite(&mut self.answers, answers);
        overwrite(&mut self.revision_number, revision_number);
        overwrite(&mut self.max_revisions, max_revisions);
        overwrite(&mut self.count, count);
        self.extra.extend(extra);
    }

    /// Copy of this state with `delta` applied
    pub fn merged(&self, delta: &StateDelta) -> Self {
        let mut next = self.clone();
        next.apply(delta.clone());
        next
    }

    /// Delta that rebuilds this state from an empty one
    pub fn to_delta(&self) -> StateDelta {
        StateDelta {
            task: Some(self.task.clone()),
            plan: Some(self.plan.clone()),
            draft: Some(self.draft.clone()),
            critique: Some(self.critique.clone()),
            queries: Some(self.queries.clone()),
            answers: Some(self.answers.clone()),
            revision_number: Some(self.revision_number),
            max_revisions: Some(self.max_revisions),
            count: Some(self.count),
            extra: self.extra.clone(),
        }
    }
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layer `other` on top of `self`; fields present in `other` win.
    pub fn overlay(mut self, other: StateDelta) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            task,
            plan,
            draft,
            critique,
            queries,
            answers,
            revision_number,
            max_revisions,
            count
        );
        self.extra.extend(other.extra);
        self
    }

    /// Drop fields a caller may not set once a thread exists. Revision
    /// counters, the research log and step bookkeeping belong to the nodes.
    pub fn caller_input(mut self) -> Self {
        self.queries = None;
        self.answers = None;
        self.revision_number = None;
        self.max_revisions = None;
        self.count = None;
        for reserved in ["last_node", "next_nodes", "lnode", "nnode", "thread_id", "thread_ts"] {
            self.extra.remove(reserved);
        }
        self
    }
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

/// True when `next` keeps every element of `prev` in place and only adds to the end
pub fn is_extension_of(prev: &[String], next: &[String]) -> bool {
    next.len() >= prev.len() && next[..prev.len()] == *prev
}
