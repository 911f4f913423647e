/// Node dispatch
///
/// Maps a node's type tag onto a registered [`NodeHandler`] and turns the
/// handler's outcome into a [`NodeResult`]. Unknown type tags fall back to a
/// passthrough handler rather than failing the run, so graphs keep working
/// while a custom handler is still being written. Handler errors are captured
/// into the result — dispatch itself never propagates them.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::runtime::execution::{Execution, NodeResult};
use crate::runtime::handlers::{HandlerContext, NodeHandler, PassthroughHandler};
use crate::workflow::types::{Node, WorkflowGraph};

pub struct NodeDispatcher {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
    fallback: Arc<dyn NodeHandler>,
}

impl NodeDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(PassthroughHandler),
        }
    }

    /// Register a handler for a type tag. Re-registering a tag replaces the
    /// previous handler.
    pub fn register(&mut self, node_type: &str, handler: Arc<dyn NodeHandler>) {
        if self.handlers.insert(node_type.to_string(), handler).is_some() {
            tracing::debug!("🔁 replaced handler for node type '{}'", node_type);
        }
    }

    /// Execute one node and record the outcome.
    pub async fn dispatch(
        &self,
        node: &Node,
        items: Vec<Value>,
        ctx: &HandlerContext,
    ) -> NodeResult {
        let handler = self
            .handlers
            .get(&node.node_type)
            .unwrap_or(&self.fallback);

        let start = Instant::now();
        let outcome = handler.execute(node, items, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(items) => {
                tracing::debug!(
                    "✅ node '{}' ({}) produced {} item(s) in {}ms",
                    node.id,
                    node.node_type,
                    items.len(),
                    duration_ms
                );
                NodeResult::succeeded(items, duration_ms)
            }
            Err(error) => {
                tracing::warn!(
                    "❌ node '{}' ({}) failed after {}ms: {}",
                    node.id,
                    node.node_type,
                    duration_ms,
                    error
                );
                NodeResult::failed(error.to_string(), duration_ms)
            }
        }
    }
}

impl Default for NodeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the input item array for a node from its upstream results.
///
/// Incoming connections contribute in declared order; a node with no incoming
/// connections receives the run input if it is the plan's first node, and a
/// single empty item otherwise (so every handler sees at least one item).
pub fn node_input_items(
    execution: &Execution,
    node_id: &str,
    graph: &WorkflowGraph,
    plan: &[String],
) -> Vec<Value> {
    let mut items = Vec::new();
    for connection in &graph.connections {
        if connection.to != node_id {
            continue;
        }
        if let Some(result) = execution.node_results.get(&connection.from) {
            if result.success {
                items.extend(result.items.iter().cloned());
            }
        }
    }

    if !items.is_empty() {
        return items;
    }

    if plan.first().map(String::as_str) == Some(node_id) {
        if execution.input.is_empty() {
            return vec![json!({})];
        }
        return execution.input.clone();
    }

    vec![json!({})]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::execution::ExecutionOptions;
    use crate::runtime::handlers::test_ctx;
    use crate::workflow::types::{Connection, ErrorPolicy};

    fn node(id: &str, node_type: &str) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_uppercase(),
            node_type: node_type.to_string(),
            params: Value::Null,
            on_error: ErrorPolicy::default(),
            retry_on_fail: false,
        }
    }

    fn graph(nodes: Vec<Node>, connections: Vec<Connection>) -> WorkflowGraph {
        WorkflowGraph {
            id: "wf".to_string(),
            name: "Test".to_string(),
            nodes,
            connections,
        }
    }

    fn connection(from: &str, to: &str) -> Connection {
        Connection {
            from: from.to_string(),
            to: to.to_string(),
            port: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_type_falls_back_to_passthrough() {
        let dispatcher = NodeDispatcher::new();
        let result = dispatcher
            .dispatch(&node("a", "custom.unknown"), vec![json!({"x": 1})], &test_ctx())
            .await;
        assert!(result.success);
        assert_eq!(result.items[0]["x"], json!(1));
        assert_eq!(result.items[0]["_node"]["id"], json!("a"));
    }

    #[tokio::test]
    async fn handler_errors_are_captured_not_propagated() {
        struct AlwaysFails;
        #[async_trait::async_trait]
        impl NodeHandler for AlwaysFails {
            async fn execute(
                &self,
                _node: &Node,
                _items: Vec<Value>,
                _ctx: &HandlerContext,
            ) -> anyhow::Result<Vec<Value>> {
                anyhow::bail!("boom")
            }
        }

        let mut dispatcher = NodeDispatcher::new();
        dispatcher.register("test.fail", Arc::new(AlwaysFails));
        let result = dispatcher
            .dispatch(&node("a", "test.fail"), vec![], &test_ctx())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.items.is_empty());
    }

    #[test]
    fn first_plan_node_receives_run_input() {
        let graph = graph(vec![node("a", "t"), node("b", "t")], vec![connection("a", "b")]);
        let execution = Execution::new("wf", json!([{"seed": 1}]), ExecutionOptions::default());
        let plan = vec!["a".to_string(), "b".to_string()];

        let items = node_input_items(&execution, "a", &graph, &plan);
        assert_eq!(items, vec![json!({"seed": 1})]);
    }

    #[test]
    fn downstream_node_receives_upstream_output() {
        let graph = graph(vec![node("a", "t"), node("b", "t")], vec![connection("a", "b")]);
        let mut execution = Execution::new("wf", Value::Null, ExecutionOptions::default());
        execution
            .node_results
            .insert("a".to_string(), NodeResult::succeeded(vec![json!({"out": 1})], 5));
        let plan = vec!["a".to_string(), "b".to_string()];

        let items = node_input_items(&execution, "b", &graph, &plan);
        assert_eq!(items, vec![json!({"out": 1})]);
    }

    #[test]
    fn orphan_node_receives_single_empty_item() {
        let graph = graph(
            vec![node("a", "t"), node("b", "t"), node("c", "t")],
            vec![connection("a", "b")],
        );
        let execution = Execution::new("wf", json!([{"seed": 1}]), ExecutionOptions::default());
        let plan = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let items = node_input_items(&execution, "c", &graph, &plan);
        assert_eq!(items, vec![json!({})]);
    }

    #[test]
    fn failed_upstream_contributes_nothing() {
        let graph = graph(
            vec![node("a", "t"), node("x", "t"), node("b", "t")],
            vec![connection("a", "b"), connection("x", "b")],
        );
        let mut execution = Execution::new("wf", Value::Null, ExecutionOptions::default());
        execution
            .node_results
            .insert("a".to_string(), NodeResult::succeeded(vec![json!({"a": 1})], 1));
        execution
            .node_results
            .insert("x".to_string(), NodeResult::failed("down".to_string(), 1));
        let plan = vec!["a".to_string(), "x".to_string(), "b".to_string()];

        let items = node_input_items(&execution, "b", &graph, &plan);
        assert_eq!(items, vec![json!({"a": 1})]);
    }
}
