/// In-memory graph registry
///
/// Holds every deployable graph pre-compiled (validated, with its execution
/// plan already built), behind an `ArcSwap` so the hot path — looking up a
/// graph at submission time — is a lock-free load. Mutations rebuild the map
/// and swap it in whole; they are rare enough that the copy cost is noise.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EngineError;
use crate::workflow::planner::build_execution_plan;
use crate::workflow::storage::WorkflowStorage;
use crate::workflow::types::WorkflowGraph;

/// A validated graph with its plan attached. Compilation happens once, at
/// deploy time, so submission never pays for validation or planning of an
/// unchanged graph.
#[derive(Clone)]
pub struct CompiledGraph {
    pub graph: Arc<WorkflowGraph>,
    pub plan: Arc<Vec<String>>,
}

impl CompiledGraph {
    pub fn compile(graph: WorkflowGraph) -> Result<Self, EngineError> {
        graph.validate()?;
        let plan = build_execution_plan(&graph.nodes, &graph.connections)?;
        Ok(Self {
            graph: Arc::new(graph),
            plan: Arc::new(plan),
        })
    }
}

pub struct GraphRegistry {
    graphs: ArcSwap<HashMap<String, CompiledGraph>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self {
            graphs: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Build the registry from persisted definitions. Graphs that no longer
    /// compile are skipped with a warning rather than blocking startup.
    pub async fn init_from_storage(storage: &WorkflowStorage) -> anyhow::Result<Self> {
        let registry = Self::new();
        let mut map = HashMap::new();
        for graph in storage.load_all().await? {
            let id = graph.id.clone();
            match CompiledGraph::compile(graph) {
                Ok(compiled) => {
                    map.insert(id, compiled);
                }
                Err(e) => tracing::warn!("⚠️ skipping workflow '{}': {}", id, e),
            }
        }
        tracing::info!("📚 loaded {} workflow(s)", map.len());
        registry.graphs.store(Arc::new(map));
        Ok(registry)
    }

    /// Compile and publish a graph, replacing any previous version under the
    /// same id.
    pub fn deploy(&self, graph: WorkflowGraph) -> Result<CompiledGraph, EngineError> {
        let compiled = CompiledGraph::compile(graph)?;
        let mut map = HashMap::clone(&self.graphs.load());
        map.insert(compiled.graph.id.clone(), compiled.clone());
        self.graphs.store(Arc::new(map));
        Ok(compiled)
    }

    pub fn get(&self, id: &str) -> Option<CompiledGraph> {
        self.graphs.load().get(id).cloned()
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut map = HashMap::clone(&self.graphs.load());
        let removed = map.remove(id).is_some();
        if removed {
            self.graphs.store(Arc::new(map));
        }
        removed
    }
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{Connection, ErrorPolicy, Node};
    use serde_json::Value;

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

    fn graph(id: &str) -> WorkflowGraph {
        WorkflowGraph {
            id: id.to_string(),
            name: "Test".to_string(),
            nodes: vec![node("a"), node("b")],
            connections: vec![Connection {
                from: "a".to_string(),
                to: "b".to_string(),
                port: "main".to_string(),
            }],
        }
    }

    #[test]
    fn deploy_compiles_and_publishes() {
        let registry = GraphRegistry::new();
        let compiled = registry.deploy(graph("wf-1")).unwrap();
        assert_eq!(*compiled.plan, vec!["a".to_string(), "b".to_string()]);
        assert!(registry.get("wf-1").is_some());
        assert_eq!(registry.list_ids(), vec!["wf-1".to_string()]);
    }

    #[test]
    fn deploy_rejects_cyclic_graphs() {
        let registry = GraphRegistry::new();
        let mut cyclic = graph("wf-1");
        cyclic.connections.push(Connection {
            from: "b".to_string(),
            to: "a".to_string(),
            port: "main".to_string(),
        });
        assert!(matches!(
            registry.deploy(cyclic),
            Err(EngineError::CycleDetected { .. })
        ));
        assert!(registry.get("wf-1").is_none());
    }

    #[test]
    fn remove_reports_whether_graph_existed() {
        let registry = GraphRegistry::new();
        registry.deploy(graph("wf-1")).unwrap();
        assert!(registry.remove("wf-1"));
        assert!(!registry.remove("wf-1"));
        assert!(registry.get("wf-1").is_none());
    }

    #[test]
    fn redeploy_replaces_previous_version() {
        let registry = GraphRegistry::new();
        registry.deploy(graph("wf-1")).unwrap();
        let mut updated = graph("wf-1");
        updated.name = "Renamed".to_string();
        registry.deploy(updated).unwrap();
        assert_eq!(registry.get("wf-1").unwrap().graph.name, "Renamed");
    }
}
