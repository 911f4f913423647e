/// Node execution handlers
///
/// Each node type's behavior lives behind the [`NodeHandler`] trait: take the
/// node definition and the incoming item array, return the outgoing item
/// array or fail. Handlers are deliberately ignorant of engine concerns —
/// queueing, retries and failure policy all live on the dispatcher side of
/// the seam, so a handler can be tested (and replaced) in isolation.

pub mod data;
pub mod http;
pub mod script;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::workflow::types::Node;

pub use data::{DataReadHandler, DataWriteHandler};
pub use http::HttpRequestHandler;
pub use script::LuaScriptHandler;

/// Per-dispatch context handed to a handler alongside the node and items.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub execution_id: String,
    pub graph_id: String,
}

/// Execution strategy for one node type.
///
/// The contract is `(node, items) -> items`; any error is captured by the
/// dispatcher into the node's result rather than propagated.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>>;
}

/// Generic fallback used when no handler is registered for a type tag.
///
/// Returns the input items unchanged apart from a `_node` annotation carrying
/// the node's id, name and type. Pure: identical input yields identical
/// output, and nothing outside the items is touched.
pub struct PassthroughHandler;

#[async_trait]
impl NodeHandler for PassthroughHandler {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let annotation = json!({
            "id": node.id,
            "name": node.name,
            "type": node.node_type,
        });
        let annotated = items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut map) => {
                    map.insert("_node".to_string(), annotation.clone());
                    Value::Object(map)
                }
                other => json!({ "_node": annotation, "json": other }),
            })
            .collect();
        Ok(annotated)
    }
}

/// Pure field setter: merges `params.values` into every item.
///
/// Non-object items are replaced by an object holding just the configured
/// values. Handy as a cheap transform and as a no-dependency node type in
/// tests.
pub struct SetFieldsHandler;

#[async_trait]
impl NodeHandler for SetFieldsHandler {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let values = node
            .params
            .get("values")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let items = if items.is_empty() {
            vec![json!({})]
        } else {
            items
        };

        Ok(items
            .into_iter()
            .map(|item| {
                let mut map = match item {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                for (key, value) in &values {
                    map.insert(key.clone(), value.clone());
                }
                Value::Object(map)
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) fn test_ctx() -> HandlerContext {
    HandlerContext {
        execution_id: "exec-test".to_string(),
        graph_id: "wf-test".to_string(),
    }
}
