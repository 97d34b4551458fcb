// SPDX-License-Identifier: MIT

//! Wiring of the vacation-planning graph

use std::collections::HashMap;
use std::sync::Arc;

use crate::adk::error::WorkflowError;
use crate::adk::generation::TextGeneration;
use crate::adk::search::Search;
use crate::wayfarer::workflow::nodes::{
    should_continue, GenerateNode, PlannerNode, ReflectNode, ResearchCritiqueNode, ResearchPlanNode,
    GENERATE, PLANNER, REFLECT, RESEARCH_CRITIQUE, RESEARCH_PLAN,
};
use crate::wayfarer::workflow::registry::{CompiledGraph, NodeRegistry, Target, END};

/// Build the fixed graph:
///
/// ```text
/// planner -> research_plan -> generate --(revisions left)--> reflect -> research_critique -> generate
///                                      \--(budget spent)---> END
/// ```
pub fn build_vacation_graph(
    generator: Arc<dyn TextGeneration>,
    search: Arc<dyn Search>,
) -> Result<CompiledGraph, WorkflowError> {
    let branches = HashMap::from([
        (END.to_string(), Target::End),
        (REFLECT.to_string(), Target::node(REFLECT)),
    ]);

    NodeRegistry::new()
        .add_node(Arc::new(PlannerNode::new(generator.clone())))
        .add_node(Arc::new(ResearchPlanNode::new(generator.clone(), search.clone())))
        .add_node(Arc::new(GenerateNode::new(generator.clone())))
        .add_node(Arc::new(ReflectNode::new(generator.clone())))
        .add_node(Arc::new(ResearchCritiqueNode::new(generator, search)))
        .set_entry_point(PLANNER)
        .add_edge(PLANNER, RESEARCH_PLAN)
        .add_edge(RESEARCH_PLAN, GENERATE)
        .add_conditional_edges(GENERATE, should_continue, branches)
        .add_edge(REFLECT, RESEARCH_CRITIQUE)
        .add_edge(RESEARCH_CRITIQUE, GENERATE)
        .compile()
}
