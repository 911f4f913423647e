/// Execution runtime: dispatch, queueing, retries, lifecycle events and the
/// execution registry.

pub mod dispatcher;
pub mod events;
pub mod execution;
pub mod handlers;
pub mod queue;
pub mod registry;
pub mod retry;

pub use dispatcher::NodeDispatcher;
pub use events::{ExecutionEvent, ExecutionEvents};
pub use execution::{
    Execution, ExecutionOptions, ExecutionStats, ExecutionStatus, ExecutionSummary, NodeResult,
    RetryScope,
};
pub use queue::ExecutionQueue;
pub use registry::{ExecutionHandle, ExecutionRegistry};
pub use retry::{RetryController, RunOutcome};
