// SPDX-License-Identifier: MIT

//! Search providers used by the research nodes

pub mod brave;
pub mod tavily;

pub use brave::BraveSearch;
pub use tavily::TavilySearch;
