// SPDX-License-Identifier: MIT

//! Graph execution
//!
//! [`WorkflowEngine`] walks a [`CompiledGraph`](super::registry::CompiledGraph)
//! one node at a time, checkpointing every step in the
//! [`StateStore`](super::state::StateStore).

pub mod executor;

pub use executor::{RunRequest, WorkflowEngine, DEFAULT_MAX_ITERATIONS};
