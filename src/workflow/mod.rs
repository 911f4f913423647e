/// Workflow definitions: graph types, validation, planning, persistence and
/// the deployed-graph registry.

pub mod planner;
pub mod registry;
pub mod storage;
pub mod types;

pub use planner::build_execution_plan;
pub use registry::{CompiledGraph, GraphRegistry};
pub use storage::WorkflowStorage;
pub use types::{Connection, ErrorPolicy, Node, WorkflowGraph};
