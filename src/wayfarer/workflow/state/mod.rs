// SPDX-License-Identifier: MIT

//! State management for the planning workflow
//!
//! This module provides:
//! - `PlannerState` / `StateDelta` - the shared record and partial updates to it
//! - `ThreadId` / `ThreadIdAllocator` - identifiers for independent runs
//! - `Snapshot` / `StateStore` - the append-only checkpoint log

mod schema;
mod store;
mod thread;

pub use schema::{is_extension_of, PlannerState, StateDelta, DEFAULT_MAX_REVISIONS};
pub use store::{StateStore, ThreadWriter};
pub use thread::{CounterAllocator, Snapshot, ThreadId, ThreadIdAllocator, UuidAllocator};
