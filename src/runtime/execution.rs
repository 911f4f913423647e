/// Runtime execution state
///
/// One [`Execution`] is one run of a graph against a specific input payload.
/// Data flows between nodes as arrays of JSON items — even a single payload
/// is wrapped in an array so every handler sees the same shape. Executions
/// are created on submission, mutated by the queue (status), the dispatcher
/// (result map) and the retry controller (retry count), and are never
/// destroyed while active; a terminal execution lingers in the active table
/// for a retention window before being evicted into bounded history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of one execution.
///
/// The sequence is monotonic (`pending → running → success | error`) with a
/// single exception: a failed attempt with retry budget left goes back to
/// `pending` without ever publishing `error`, so waiters only observe a
/// terminal status once the run is truly over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ExecutionStatus {
    /// Success and error are terminal; pending and running are not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

/// What gets re-executed after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryScope {
    /// Re-run the entire plan from the first node (the default, carried over
    /// from the source system). Handlers that already succeeded before the
    /// failing node are replayed, so side effects (HTTP calls, writes) may
    /// happen again — pick `Node` scope when that matters.
    #[default]
    Run,
    /// Retry only the failing node in place, for nodes flagged
    /// `retry_on_fail`.
    Node,
}

/// Per-run options supplied at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// How long `execute_workflow` waits for a terminal state before giving
    /// up with a timeout error. The run itself is never cancelled.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry the run after an uncaught failure.
    #[serde(default)]
    pub retry_on_failure: bool,
    /// Treat every node as `on_error: continue`.
    #[serde(default)]
    pub continue_on_fail: bool,
    /// Total attempt budget (original attempt included).
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    /// Whole-run or single-node retry.
    #[serde(default)]
    pub retry_scope: RetryScope,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_tries() -> u32 {
    3
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry_on_failure: false,
            continue_on_fail: false,
            max_tries: default_max_tries(),
            retry_scope: RetryScope::default(),
        }
    }
}

/// The recorded outcome of dispatching one node. Always produced — a node
/// execution never silently disappears, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub success: bool,
    /// Output items flowing to downstream nodes (empty on failure).
    pub items: Vec<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl NodeResult {
    pub fn succeeded(items: Vec<Value>, duration_ms: u64) -> Self {
        Self {
            success: true,
            items,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(error: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(error),
            duration_ms,
        }
    }
}

/// One run of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution identifier (UUID v4).
    pub id: String,
    /// The graph this run executes.
    pub graph_id: String,
    /// Top-level input payload, normalized to an item array.
    pub input: Vec<Value>,
    pub status: ExecutionStatus,
    /// Per-node results, keyed by node id.
    pub node_results: HashMap<String, NodeResult>,
    /// Run-level error once the run has failed.
    pub error: Option<String>,
    /// Retries consumed beyond the original attempt.
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub options: ExecutionOptions,
}

impl Execution {
    /// Create a pending execution for a graph and input payload.
    ///
    /// A JSON array payload is taken as the item array; `null` means no
    /// input; anything else becomes a single item.
    pub fn new(graph_id: &str, input: Value, options: ExecutionOptions) -> Self {
        let input = match input {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        Self {
            id: Uuid::new_v4().to_string(),
            graph_id: graph_id.to_string(),
            input,
            status: ExecutionStatus::Pending,
            node_results: HashMap::new(),
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            options,
        }
    }

    /// Wall-clock duration of the run, once both timestamps exist.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                Some((end - start).num_milliseconds().max(0) as u64)
            }
            _ => None,
        }
    }
}

/// Compact record of a finished execution, kept in bounded history after the
/// active entry is evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub id: String,
    pub graph_id: String,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub node_count: usize,
}

impl ExecutionSummary {
    pub fn of(execution: &Execution) -> Self {
        Self {
            id: execution.id.clone(),
            graph_id: execution.graph_id.clone(),
            status: execution.status,
            started_at: execution.started_at,
            finished_at: execution.finished_at,
            duration_ms: execution.duration_ms().unwrap_or(0),
            node_count: execution.node_results.len(),
        }
    }
}

/// Aggregate engine statistics, consumed by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    /// Executions currently holding status `running`.
    pub active: usize,
    /// Executions waiting for admission.
    pub queued: usize,
    /// Finished executions recorded in history.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub avg_duration_ms: f64,
}
