/// Execution queue
///
/// Front door of the engine: submission validates the graph, builds the
/// execution plan, registers a pending execution and hands its id to the
/// drain task. Admission is a semaphore — at most `max_concurrent` runs hold
/// a permit at once, everything else waits in the channel without burning a
/// task. A retry releases its permit first and re-competes for admission
/// after the retry delay, so a flapping run never starves fresh submissions.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::error::EngineError;
use crate::runtime::execution::{Execution, ExecutionOptions};
use crate::runtime::registry::{ExecutionHandle, ExecutionRegistry};
use crate::runtime::retry::{RetryController, RunOutcome};
use crate::workflow::planner::build_execution_plan;
use crate::workflow::types::WorkflowGraph;

pub struct ExecutionQueue {
    registry: Arc<ExecutionRegistry>,
    pending_tx: mpsc::UnboundedSender<String>,
}

impl ExecutionQueue {
    /// Create the queue and spawn its drain task.
    pub fn new(
        controller: Arc<RetryController>,
        registry: Arc<ExecutionRegistry>,
        max_concurrent: usize,
        retry_delay: Duration,
    ) -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(
            pending_rx,
            pending_tx.clone(),
            controller,
            Arc::clone(&registry),
            max_concurrent,
            retry_delay,
        ));
        Self {
            registry,
            pending_tx,
        }
    }

    /// Validate, plan and enqueue a run. Returns the execution id
    /// immediately; the run proceeds in the background.
    pub async fn submit(
        &self,
        graph: Arc<WorkflowGraph>,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<String, EngineError> {
        graph.validate()?;
        let plan = build_execution_plan(&graph.nodes, &graph.connections)?;

        let execution = Execution::new(&graph.id, input, options);
        let id = execution.id.clone();
        let handle = ExecutionHandle::new(execution, graph, Arc::new(plan));
        self.registry.insert(handle).await;

        self.pending_tx
            .send(id.clone())
            .map_err(|_| EngineError::Unavailable("execution queue is shut down".to_string()))?;

        tracing::info!("📥 queued execution {}", id);
        Ok(id)
    }

    /// Submit and wait for the terminal state, bounded by
    /// `options.timeout_ms`.
    pub async fn execute_workflow(
        &self,
        graph: Arc<WorkflowGraph>,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<Execution, EngineError> {
        let timeout = Duration::from_millis(options.timeout_ms);
        let id = self.submit(graph, input, options).await?;
        self.wait_for_execution(&id, timeout).await
    }

    /// Wait until the execution reaches a terminal status or the timeout
    /// elapses. A timeout abandons the wait only — the run keeps going and
    /// can be fetched later by id.
    pub async fn wait_for_execution(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Execution, EngineError> {
        let handle = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| EngineError::ExecutionNotFound(id.to_string()))?;

        let mut status_rx = handle.watch_status();
        let wait = status_rx.wait_for(|status| status.is_terminal());
        // The Ref returned on success borrows the receiver; discard it before
        // matching so the borrow ends inside the await.
        let outcome = tokio::time::timeout(timeout, wait)
            .await
            .map(|result| result.map(|_| ()));
        match outcome {
            Ok(Ok(())) => Ok(handle.snapshot().await),
            Ok(Err(_)) => Err(EngineError::Unavailable(
                "execution status channel closed".to_string(),
            )),
            Err(_) => Err(EngineError::WaitTimeout {
                id: id.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Pull pending ids, gate each on a permit, and run attempts in their own
/// tasks. The permit is dropped before the retry delay so waiting runs get
/// admitted while the failed one backs off.
async fn drain(
    mut pending_rx: mpsc::UnboundedReceiver<String>,
    retry_tx: mpsc::UnboundedSender<String>,
    controller: Arc<RetryController>,
    registry: Arc<ExecutionRegistry>,
    max_concurrent: usize,
    retry_delay: Duration,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    while let Some(id) = pending_rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let Some(handle) = registry.get(&id).await else {
            tracing::warn!("⚠️ dropping unknown execution {}", id);
            continue;
        };

        let controller = Arc::clone(&controller);
        let retry_tx = retry_tx.clone();
        tokio::spawn(async move {
            let outcome = controller.run_attempt(&handle).await;
            drop(permit);
            if outcome == RunOutcome::Retry {
                tokio::time::sleep(retry_delay).await;
                let _ = retry_tx.send(id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::dispatcher::NodeDispatcher;
    use crate::runtime::events::ExecutionEvents;
    use crate::runtime::execution::ExecutionStatus;
    use crate::workflow::types::{Connection, ErrorPolicy, Node};

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_uppercase(),
            node_type: "custom.noop".to_string(),
            params: Value::Null,
            on_error: ErrorPolicy::default(),
            retry_on_fail: false,
        }
    }

    fn chain(ids: &[&str]) -> Arc<WorkflowGraph> {
        let connections = ids
            .windows(2)
            .map(|pair| Connection {
                from: pair[0].to_string(),
                to: pair[1].to_string(),
                port: "main".to_string(),
            })
            .collect();
        Arc::new(WorkflowGraph {
            id: "wf".to_string(),
            name: "Chain".to_string(),
            nodes: ids.iter().map(|&id| node(id)).collect(),
            connections,
        })
    }

    fn queue() -> ExecutionQueue {
        let registry = Arc::new(ExecutionRegistry::new(100, Duration::from_secs(60)));
        let controller = Arc::new(RetryController::new(
            Arc::new(NodeDispatcher::new()),
            Arc::new(ExecutionEvents::new()),
            Arc::clone(&registry),
        ));
        ExecutionQueue::new(controller, registry, 4, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn simple_chain_runs_to_success() {
        let queue = queue();
        let execution = queue
            .execute_workflow(chain(&["a", "b"]), Value::Null, ExecutionOptions::default())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.node_results.len(), 2);
    }

    #[tokio::test]
    async fn cyclic_graph_is_rejected_at_submission() {
        let queue = queue();
        let graph = Arc::new(WorkflowGraph {
            id: "wf".to_string(),
            name: "Cycle".to_string(),
            nodes: vec![node("a"), node("b")],
            connections: vec![
                Connection {
                    from: "a".to_string(),
                    to: "b".to_string(),
                    port: "main".to_string(),
                },
                Connection {
                    from: "b".to_string(),
                    to: "a".to_string(),
                    port: "main".to_string(),
                },
            ],
        });
        let err = queue
            .submit(graph, Value::Null, ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn invalid_graph_is_rejected_at_submission() {
        let queue = queue();
        let graph = Arc::new(WorkflowGraph {
            id: "wf".to_string(),
            name: "Bad".to_string(),
            nodes: vec![Node {
                id: String::new(),
                name: "Unnamed".to_string(),
                node_type: "t".to_string(),
                params: Value::Null,
                on_error: ErrorPolicy::default(),
                retry_on_fail: false,
            }],
            connections: Vec::new(),
        });
        let err = queue
            .submit(graph, Value::Null, ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn waiting_for_unknown_execution_fails() {
        let queue = queue();
        let err = queue
            .wait_for_execution("nope", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExecutionNotFound(_)));
    }
}
