/// HTTP API layer
///
/// REST endpoints for workflow management and execution control:
/// - Workflow CRUD with compile-on-deploy (invalid graphs never go live)
/// - Synchronous and fire-and-forget execution triggering
/// - Execution lookup and aggregate engine stats

pub mod executions;
pub mod workflows;

use std::sync::Arc;

use crate::runtime::queue::ExecutionQueue;
use crate::runtime::registry::ExecutionRegistry;
use crate::workflow::registry::GraphRegistry;
use crate::workflow::storage::WorkflowStorage;

pub use executions::create_execution_routes;
pub use workflows::create_workflow_routes;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<WorkflowStorage>,
    pub graphs: Arc<GraphRegistry>,
    pub queue: Arc<ExecutionQueue>,
    pub executions: Arc<ExecutionRegistry>,
}
