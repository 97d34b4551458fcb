// SPDX-License-Identifier: MIT

//! Vacation-planning application: the checkpointed workflow, its search
//! providers, configuration and the HTTP facade.

pub mod config;
pub mod server;
pub mod tools;
pub mod workflow;
