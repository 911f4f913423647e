/// Flowgate: workflow orchestration engine
///
/// Declarative graphs of typed nodes, compiled into deterministic execution
/// plans and run with bounded concurrency, whole-run retries and explicit
/// lifecycle events.

// Core configuration and setup
pub mod config;

// Error taxonomy shared across the engine
pub mod error;

// Workflow management layer - definitions, validation, planning, storage
pub mod workflow;

// Runtime execution engine - dispatch, queueing, retries, registries
pub mod runtime;

// HTTP API layer - REST endpoints for workflows and executions
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::EngineError;
pub use runtime::{
    Execution, ExecutionOptions, ExecutionQueue, ExecutionStatus, NodeDispatcher,
};
pub use server::start_server;
pub use workflow::{build_execution_plan, Connection, Node, WorkflowGraph};
