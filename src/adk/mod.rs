// SPDX-License-Identifier: MIT

//! Provider-facing building blocks: chat models, the text generation and
//! search capabilities, and the crate's error types.

pub mod error;
pub mod generation;
pub mod model;
pub mod search;
