// SPDX-License-Identifier: MIT

pub mod builder;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod registry;
pub mod state;

#[cfg(test)]
pub(crate) mod mocks;
