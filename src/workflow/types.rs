/// Core workflow graph definitions
///
/// Defines the declarative structures a caller submits: typed nodes, directed
/// connections, and the graph that holds them. These types are serialized to
/// JSON for persistence and are immutable once a run starts — the engine only
/// ever reads them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::EngineError;

/// What the engine does with the rest of the plan when this node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Abort the whole run with this node's error (the default).
    #[default]
    Stop,
    /// Record the failure in the node's result and keep going.
    Continue,
}

/// A single typed unit of work in a workflow graph.
///
/// The type tag is a free-form string resolved against the handler registry
/// at dispatch time; unknown tags fall back to an annotating passthrough, so
/// a graph never fails solely because a handler is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the graph (e.g. "n1", "fetch-users").
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Handler type tag (e.g. "http.request", "script.lua").
    #[serde(rename = "type")]
    pub node_type: String,
    /// Node-specific configuration as flexible JSON.
    #[serde(default)]
    pub params: Value,
    /// Failure policy applied when this node's handler fails.
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// Opt this node into in-place retries when the run uses node-scoped
    /// retry (see `RetryScope::Node`).
    #[serde(default)]
    pub retry_on_fail: bool,
}

/// A directed edge from one node's output to another node's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Output port on the source node.
    #[serde(default = "default_port")]
    pub port: String,
}

fn default_port() -> String {
    "main".to_string()
}

/// A complete workflow definition: nodes plus the connections between them.
///
/// Invariants enforced by [`WorkflowGraph::validate`]: node ids are unique
/// and every connection endpoint resolves to a member node. Cycle freedom is
/// checked separately by the planner, which needs to name the offending node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Unique graph identifier (e.g. "wf-enrich-orders").
    pub id: String,
    /// Human-readable graph name.
    pub name: String,
    /// Nodes in this graph, in declared order.
    pub nodes: Vec<Node>,
    /// Connections between nodes, in declared order.
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl WorkflowGraph {
    /// Look up a member node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Structural validation run before anything is planned or scheduled.
    ///
    /// Checks required fields on every node and that connections reference
    /// only existing node ids. Failures here are never retried and never
    /// reach the queue.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.is_empty() {
            return Err(EngineError::Validation("graph id must not be empty".into()));
        }
        if self.nodes.is_empty() {
            return Err(EngineError::Validation(format!(
                "graph '{}' has no nodes",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() || node.name.is_empty() || node.node_type.is_empty() {
                return Err(EngineError::Validation(format!(
                    "node '{}' is missing a required field (id, name, type)",
                    node.id
                )));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(EngineError::Validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        for conn in &self.connections {
            if !seen.contains(conn.from.as_str()) {
                return Err(EngineError::Validation(format!(
                    "connection references unknown source node '{}'",
                    conn.from
                )));
            }
            if !seen.contains(conn.to.as_str()) {
                return Err(EngineError::Validation(format!(
                    "connection references unknown target node '{}'",
                    conn.to
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    fn conn(from: &str, to: &str) -> Connection {
        Connection {
            from: from.to_string(),
            to: to.to_string(),
            port: default_port(),
        }
    }

    #[test]
    fn valid_graph_passes() {
        let graph = WorkflowGraph {
            id: "wf".into(),
            name: "wf".into(),
            nodes: vec![node("a", "transform.set"), node("b", "transform.set")],
            connections: vec![conn("a", "b")],
        };
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn duplicate_node_ids_rejected() {
        let graph = WorkflowGraph {
            id: "wf".into(),
            name: "wf".into(),
            nodes: vec![node("a", "x"), node("a", "y")],
            connections: vec![],
        };
        assert!(matches!(
            graph.validate(),
            Err(EngineError::Validation(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn dangling_connection_rejected() {
        let graph = WorkflowGraph {
            id: "wf".into(),
            name: "wf".into(),
            nodes: vec![node("a", "x")],
            connections: vec![conn("a", "ghost")],
        };
        assert!(matches!(
            graph.validate(),
            Err(EngineError::Validation(msg)) if msg.contains("ghost")
        ));
    }

    #[test]
    fn missing_type_rejected() {
        let graph = WorkflowGraph {
            id: "wf".into(),
            name: "wf".into(),
            nodes: vec![node("a", "")],
            connections: vec![],
        };
        assert!(graph.validate().is_err());
    }

    #[test]
    fn node_deserializes_with_defaults() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "name": "Fetch",
            "type": "http.request"
        }))
        .unwrap();
        assert_eq!(node.on_error, ErrorPolicy::Stop);
        assert!(!node.retry_on_fail);
        assert!(node.params.is_null());
    }
}
