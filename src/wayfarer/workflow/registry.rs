// SPDX-License-Identifier: MIT

//! Node registration and graph wiring
//!
//! [`NodeRegistry`] collects nodes, edges and the entry point, and
//! [`NodeRegistry::compile`] validates them into an immutable [`CompiledGraph`].

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::adk::error::WorkflowError;
use crate::wayfarer::workflow::state::{PlannerState, StateDelta};

/// Name reserved for the terminal marker
pub const END: &str = "__end__";

/// A named step: reads the state, returns a partial update
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: &PlannerState) -> Result<StateDelta, WorkflowError>;
}

/// Where an edge leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    End,
}

impl Target {
    pub fn node(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == END {
            Target::End
        } else {
            Target::Node(name)
        }
    }
}

/// Chooses a branch key from the state produced by the edge's source node
pub type Predicate = Arc<dyn Fn(&PlannerState) -> String + Send + Sync>;

/// Outgoing edge of a node
#[derive(Clone)]
pub enum Edge {
    Static(Target),
    Conditional {
        predicate: Predicate,
        branches: HashMap<String, Target>,
    },
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Static(target) => f.debug_tuple("Static").field(target).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("branches", branches)
                .finish_non_exhaustive(),
        }
    }
}

impl Edge {
    fn targets(&self) -> Vec<&Target> {
        match self {
            Edge::Static(target) => vec![target],
            Edge::Conditional { branches, .. } => branches.values().collect(),
        }
    }
}

/// Graph under construction
#[derive(Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
    order: Vec<String>,
    edges: Vec<(String, Edge)>,
    entry_points: Vec<String>,
    duplicates: Vec<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, node: Arc<dyn Node>) -> Self {
        let name = node.name().to_string();
        if self.nodes.insert(name.clone(), node).is_some() {
            self.duplicates.push(name);
        } else {
            self.order.push(name);
        }
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Static(Target::node(to))));
        self
    }

    /// Route out of `from` by evaluating `predicate` on the state `from`
    /// produced and looking the result up in `branches`
    pub fn add_conditional_edges<F>(
        mut self,
        from: impl Into<String>,
        predicate: F,
        branches: HashMap<String, Target>,
    ) -> Self
    where
        F: Fn(&PlannerState) -> String + Send + Sync + 'static,
    {
        self.edges.push((
            from.into(),
            Edge::Conditional {
                predicate: Arc::new(predicate),
                branches,
            },
        ));
        self
    }

    pub fn set_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_points.push(name.into());
        self
    }

    /// Validate the wiring and freeze it
    pub fn compile(self) -> Result<CompiledGraph, WorkflowError> {
        let config_error = |msg: String| Err(WorkflowError::GraphConfig(msg));

        if let Some(name) = self.duplicates.first() {
            return config_error(format!("node '{}' registered twice", name));
        }
        if self.nodes.contains_key(END) {
            return config_error(format!("'{}' is reserved for the terminal marker", END));
        }

        let entry = match self.entry_points.as_slice() {
            [entry] => entry.clone(),
            [] => return config_error("no entry point set".to_string()),
            many => return config_error(format!("multiple entry points: {:?}", many)),
        };
        if !self.nodes.contains_key(&entry) {
            return config_error(format!("entry point '{}' is not a registered node", entry));
        }

        let mut edges = HashMap::new();
        for (from, edge) in self.edges {
            if !self.nodes.contains_key(&from) {
                return config_error(format!("edge source '{}' is not a registered node", from));
            }
            if let Edge::Conditional { branches, .. } = &edge {
                if branches.is_empty() {
                    return config_error(format!("conditional edge from '{}' has no branches", from));
                }
            }
            for target in edge.targets() {
                if let Target::Node(to) = target {
                    if !self.nodes.contains_key(to) {
                        return config_error(format!(
                            "edge '{}' -> '{}' targets an unregistered node",
                            from, to
                        ));
                    }
                }
            }
            if edges.insert(from.clone(), edge).is_some() {
                return config_error(format!("node '{}' has more than one outgoing edge", from));
            }
        }

        let dangling: Vec<&String> = self.order.iter().filter(|n| !edges.contains_key(*n)).collect();
        if !dangling.is_empty() {
            return config_error(format!("nodes without an outgoing edge: {:?}", dangling));
        }

        log::debug!("Compiled graph with {} nodes, entry '{}'", self.order.len(), entry);

        Ok(CompiledGraph {
            nodes: self.nodes,
            order: self.order,
            edges,
            entry,
        })
    }
}

/// Validated, immutable graph
pub struct CompiledGraph {
    nodes: HashMap<String, Arc<dyn Node>>,
    order: Vec<String>,
    edges: HashMap<String, Edge>,
    entry: String,
}

impl CompiledGraph {
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(name)
    }

    /// Node names in registration order
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    /// Successors of `from` given the state it produced. Empty means terminal.
    pub fn next_nodes(&self, from: &str, state: &PlannerState) -> Result<Vec<String>, WorkflowError> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| WorkflowError::UnknownNode(from.to_string()))?;

        let target = match edge {
            Edge::Static(target) => target,
            Edge::Conditional { predicate, branches } => {
                let key = predicate(state);
                branches.get(&key).ok_or_else(|| {
                    WorkflowError::GraphConfig(format!(
                        "conditional edge from '{}' returned unmapped branch '{}'",
                        from, key
                    ))
                })?
            }
        };

        Ok(match target {
            Target::Node(name) => vec![name.clone()],
            Target::End => vec![],
        })
    }

    /// All node names reachable in one hop from `from`, regardless of state
    pub fn successors(&self, from: &str) -> HashSet<&str> {
        self.edges
            .get(from)
            .map(|edge| {
                edge.targets()
                    .into_iter()
                    .filter_map(|t| match t {
                        Target::Node(name) => Some(name.as_str()),
                        Target::End => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
