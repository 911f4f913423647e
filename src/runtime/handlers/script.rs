/// Embedded Lua script handler
///
/// Executes `script.lua` nodes with an isolated, sandboxed Lua state per
/// dispatch. The incoming item array is exposed as the global `items`; the
/// script's return value becomes the outgoing item array (a single returned
/// value is wrapped). The Lua work is fully synchronous, so the state never
/// lives across an await point.

use async_trait::async_trait;
use mlua::LuaSerdeExt;
use serde_json::Value;

use crate::runtime::handlers::{HandlerContext, NodeHandler};
use crate::workflow::types::Node;

/// Expected params: `{ "script": "return { { doubled = items[1].x * 2 } }" }`
pub struct LuaScriptHandler;

#[async_trait]
impl NodeHandler for LuaScriptHandler {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let script = node
            .params
            .get("script")
            .and_then(|s| s.as_str())
            .ok_or_else(|| {
                anyhow::anyhow!("script.lua node '{}' missing 'script' param", node.id)
            })?;

        tracing::debug!("🧠 running Lua script for node '{}'", node.id);
        run_script(script, items)
    }
}

/// Evaluate the script against the item array in a fresh sandboxed state.
fn run_script(script: &str, items: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let lua = mlua::Lua::new();
    let globals = lua.globals();

    // Strip the escape hatches before any user code runs.
    for dangerous in ["os", "io", "debug", "package", "require", "dofile", "load"] {
        let _ = globals.set(dangerous, mlua::Nil);
    }

    let items_value = lua
        .to_value(&Value::Array(items))
        .map_err(|e| anyhow::anyhow!("failed to expose items to Lua: {}", e))?;
    globals
        .set("items", items_value)
        .map_err(|e| anyhow::anyhow!("failed to set Lua globals: {}", e))?;

    let result: mlua::Value = lua
        .load(script)
        .eval()
        .map_err(|e| anyhow::anyhow!("Lua script failed: {}", e))?;

    let json: Value = lua
        .from_value(result)
        .map_err(|e| anyhow::anyhow!("Lua result is not convertible to JSON: {}", e))?;

    Ok(match json {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}
