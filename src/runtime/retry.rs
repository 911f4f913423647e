/// Run attempts and retry policy
///
/// The controller owns one attempt of one execution: walk the plan in order,
/// dispatch each node, apply failure policy, and either finish the run or
/// hand it back to the queue for another attempt. Retries are whole-run by
/// default (`RetryScope::Run`); node-scope retries re-dispatch only the
/// failing node in place, and only for nodes flagged `retry_on_fail`.

use std::sync::Arc;

use crate::runtime::dispatcher::{node_input_items, NodeDispatcher};
use crate::runtime::events::{ExecutionEvent, ExecutionEvents};
use crate::runtime::execution::{ExecutionStatus, RetryScope};
use crate::runtime::handlers::HandlerContext;
use crate::runtime::registry::{ExecutionHandle, ExecutionRegistry};
use crate::workflow::types::ErrorPolicy;

/// What the queue should do with the execution after an attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Terminal state reached; the execution is finalized.
    Finished,
    /// The attempt failed and retry budget remains; re-enqueue.
    Retry,
}

pub struct RetryController {
    dispatcher: Arc<NodeDispatcher>,
    events: Arc<ExecutionEvents>,
    registry: Arc<ExecutionRegistry>,
}

impl RetryController {
    pub fn new(
        dispatcher: Arc<NodeDispatcher>,
        events: Arc<ExecutionEvents>,
        registry: Arc<ExecutionRegistry>,
    ) -> Self {
        Self {
            dispatcher,
            events,
            registry,
        }
    }

    /// Run one attempt of the execution to a terminal state or a retry
    /// decision.
    pub async fn run_attempt(&self, handle: &ExecutionHandle) -> RunOutcome {
        let (execution_id, graph_id, options, first_attempt) = {
            let mut execution = handle.execution.write().await;
            let first_attempt = execution.started_at.is_none();
            if first_attempt {
                execution.started_at = Some(chrono::Utc::now());
            }
            // A fresh attempt replays the whole plan, so stale results from
            // the failed attempt must not feed downstream nodes.
            execution.node_results.clear();
            execution.error = None;
            (
                execution.id.clone(),
                execution.graph_id.clone(),
                execution.options.clone(),
                first_attempt,
            )
        };

        if first_attempt {
            self.events
                .emit(ExecutionEvent::Started {
                    id: execution_id.clone(),
                    graph_id: graph_id.clone(),
                })
                .await;
        }
        handle.set_status(ExecutionStatus::Running).await;
        tracing::info!("🚀 executing {} (graph: {})", execution_id, graph_id);

        let ctx = HandlerContext {
            execution_id: execution_id.clone(),
            graph_id: graph_id.clone(),
        };

        let mut run_error: Option<String> = None;
        for node_id in handle.plan.iter() {
            let Some(node) = handle.graph.node(node_id) else {
                run_error = Some(format!("plan references unknown node '{}'", node_id));
                break;
            };

            let items = {
                let execution = handle.execution.read().await;
                node_input_items(&execution, node_id, &handle.graph, &handle.plan)
            };

            let mut result = self.dispatcher.dispatch(node, items.clone(), &ctx).await;

            // In-place node retry, bounded by the same attempt budget as the
            // run.
            if !result.success
                && options.retry_scope == RetryScope::Node
                && node.retry_on_fail
            {
                let mut attempts = 1u32;
                while !result.success && attempts < options.max_tries {
                    attempts += 1;
                    tracing::info!(
                        "🔄 retrying node '{}' in place (attempt {}/{})",
                        node_id,
                        attempts,
                        options.max_tries
                    );
                    result = self.dispatcher.dispatch(node, items.clone(), &ctx).await;
                }
            }

            let failed = !result.success;
            let node_error = result.error.clone();
            handle
                .execution
                .write()
                .await
                .node_results
                .insert(node_id.clone(), result);

            if failed {
                let tolerated =
                    options.continue_on_fail || node.on_error == ErrorPolicy::Continue;
                if tolerated {
                    tracing::warn!("⚠️ node '{}' failed, continuing per policy", node_id);
                    continue;
                }
                run_error = Some(format!(
                    "node '{}' failed: {}",
                    node_id,
                    node_error.unwrap_or_else(|| "unknown error".to_string())
                ));
                break;
            }
        }

        match run_error {
            None => {
                {
                    let mut execution = handle.execution.write().await;
                    execution.finished_at = Some(chrono::Utc::now());
                }
                handle.set_status(ExecutionStatus::Success).await;
                let snapshot = handle.snapshot().await;
                tracing::info!(
                    "✅ execution {} succeeded in {}ms",
                    execution_id,
                    snapshot.duration_ms().unwrap_or(0)
                );
                self.events
                    .emit(ExecutionEvent::Completed { execution: snapshot })
                    .await;
                self.registry.finalize(&execution_id).await;
                RunOutcome::Finished
            }
            Some(error) => {
                let retry_count = handle.execution.read().await.retry_count;
                let budget_left = retry_count + 1 < options.max_tries;
                let whole_run = options.retry_scope == RetryScope::Run;

                if options.retry_on_failure && whole_run && budget_left {
                    {
                        let mut execution = handle.execution.write().await;
                        execution.retry_count += 1;
                        execution.error = Some(error.clone());
                    }
                    handle.set_status(ExecutionStatus::Pending).await;
                    tracing::warn!(
                        "🔄 execution {} failed, retrying ({}/{}): {}",
                        execution_id,
                        retry_count + 1,
                        options.max_tries - 1,
                        error
                    );
                    RunOutcome::Retry
                } else {
                    {
                        let mut execution = handle.execution.write().await;
                        execution.error = Some(error.clone());
                        execution.finished_at = Some(chrono::Utc::now());
                    }
                    handle.set_status(ExecutionStatus::Error).await;
                    let snapshot = handle.snapshot().await;
                    tracing::error!("❌ execution {} failed: {}", execution_id, error);
                    self.events
                        .emit(ExecutionEvent::Failed { execution: snapshot })
                        .await;
                    self.registry.finalize(&execution_id).await;
                    RunOutcome::Finished
                }
            }
        }
    }
}
