/// Execution registry
///
/// Tracks every live execution (pending and running, plus recently finished
/// ones inside the retention window) and keeps a bounded history of compact
/// summaries once the live entry is evicted. The registry is the single
/// source of truth for execution state: the queue, the retry controller and
/// the API all read and write through handles obtained here.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::runtime::execution::{
    Execution, ExecutionStats, ExecutionStatus, ExecutionSummary,
};
use crate::workflow::types::WorkflowGraph;

/// Shared handle to one execution: the mutable state, the immutable graph and
/// plan it runs, and a watch channel broadcasting status transitions so
/// waiters never poll.
#[derive(Clone)]
pub struct ExecutionHandle {
    pub execution: Arc<RwLock<Execution>>,
    pub graph: Arc<WorkflowGraph>,
    pub plan: Arc<Vec<String>>,
    status_tx: Arc<watch::Sender<ExecutionStatus>>,
}

impl ExecutionHandle {
    pub fn new(execution: Execution, graph: Arc<WorkflowGraph>, plan: Arc<Vec<String>>) -> Self {
        let (status_tx, _) = watch::channel(execution.status);
        Self {
            execution: Arc::new(RwLock::new(execution)),
            graph,
            plan,
            status_tx: Arc::new(status_tx),
        }
    }

    /// Record a status transition and notify waiters.
    pub async fn set_status(&self, status: ExecutionStatus) {
        self.execution.write().await.status = status;
        // `send` skips the update when no receiver is subscribed, losing the
        // transition for later waiters; `send_replace` always stores it.
        self.status_tx.send_replace(status);
    }

    /// A receiver that observes every subsequent status transition.
    pub fn watch_status(&self) -> watch::Receiver<ExecutionStatus> {
        self.status_tx.subscribe()
    }

    pub async fn snapshot(&self) -> Execution {
        self.execution.read().await.clone()
    }
}

pub struct ExecutionRegistry {
    active: RwLock<HashMap<String, ExecutionHandle>>,
    history: RwLock<VecDeque<ExecutionSummary>>,
    history_limit: usize,
    /// How long a finished execution stays queryable in full before eviction.
    retention: Duration,
}

impl ExecutionRegistry {
    pub fn new(history_limit: usize, retention: Duration) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            history_limit,
            retention,
        }
    }

    pub async fn insert(&self, handle: ExecutionHandle) {
        let id = handle.execution.read().await.id.clone();
        self.active.write().await.insert(id, handle);
    }

    pub async fn get(&self, id: &str) -> Option<ExecutionHandle> {
        self.active.read().await.get(id).cloned()
    }

    /// Full execution state for a live entry.
    pub async fn snapshot(&self, id: &str) -> Option<Execution> {
        let handle = self.get(id).await?;
        Some(handle.snapshot().await)
    }

    /// Compact record for an already-evicted execution.
    pub async fn find_summary(&self, id: &str) -> Option<ExecutionSummary> {
        self.history
            .read()
            .await
            .iter()
            .find(|summary| summary.id == id)
            .cloned()
    }

    /// Record a terminal execution into bounded history and schedule eviction
    /// of the live entry after the retention window.
    pub async fn finalize(self: &Arc<Self>, id: &str) {
        let Some(handle) = self.get(id).await else {
            return;
        };
        let summary = {
            let execution = handle.execution.read().await;
            ExecutionSummary::of(&execution)
        };

        {
            let mut history = self.history.write().await;
            history.push_back(summary);
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        let registry = Arc::clone(self);
        let id = id.to_string();
        let retention = self.retention;
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            registry.active.write().await.remove(&id);
            tracing::debug!("🧹 evicted finished execution {}", id);
        });
    }

    /// Aggregate counters for the stats endpoint.
    pub async fn stats(&self) -> ExecutionStats {
        let active = self.active.read().await;
        let mut running = 0usize;
        let mut queued = 0usize;
        for handle in active.values() {
            match handle.execution.read().await.status {
                ExecutionStatus::Running => running += 1,
                ExecutionStatus::Pending => queued += 1,
                _ => {}
            }
        }
        drop(active);

        let history = self.history.read().await;
        let total = history.len();
        let succeeded = history
            .iter()
            .filter(|s| s.status == ExecutionStatus::Success)
            .count();
        let failed = total - succeeded;
        let avg_duration_ms = if total == 0 {
            0.0
        } else {
            history.iter().map(|s| s.duration_ms as f64).sum::<f64>() / total as f64
        };

        ExecutionStats {
            active: running,
            queued,
            total,
            succeeded,
            failed,
            avg_duration_ms,
        }
    }
}
