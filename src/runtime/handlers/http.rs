/// HTTP request handler
///
/// Executes `http.request` nodes: one outbound call per run of the node,
/// configured entirely from params. The response is returned as a single
/// item carrying status, headers and the parsed body, so downstream nodes
/// can branch on `success` without the engine treating a non-2xx response
/// as a node failure (unless `fail_on_error` is set).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::runtime::handlers::{HandlerContext, NodeHandler};
use crate::workflow::types::Node;

/// Expected params:
/// `{ "url": "...", "method": "GET", "headers": {..}, "body": <json>,
///    "fail_on_error": false }`
///
/// When no `body` param is given and the method carries a body, the first
/// input item is sent as JSON.
pub struct HttpRequestHandler {
    client: reqwest::Client,
}

impl HttpRequestHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for HttpRequestHandler {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let url = node
            .params
            .get("url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| anyhow::anyhow!("http.request node '{}' missing 'url' param", node.id))?;
        let method = node
            .params
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("GET")
            .to_uppercase();

        tracing::debug!("🌐 {} {} (node: {})", method, url, node.id);

        let mut request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            "PATCH" => self.client.patch(url),
            other => anyhow::bail!("unsupported HTTP method: {}", other),
        };

        if let Some(headers) = node.params.get("headers").and_then(|h| h.as_object()) {
            for (key, value) in headers {
                if let Some(header_value) = value.as_str() {
                    request = request.header(key, header_value);
                }
            }
        }

        if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
            let body = node
                .params
                .get("body")
                .cloned()
                .or_else(|| items.first().cloned());
            if let Some(body) = body {
                request = request.json(&body);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read response body: {}", e))?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        let fail_on_error = node
            .params
            .get("fail_on_error")
            .and_then(|f| f.as_bool())
            .unwrap_or(false);
        if fail_on_error && !status.is_success() {
            anyhow::bail!("HTTP {} for {} {}", status.as_u16(), method, url);
        }

        Ok(vec![json!({
            "status": status.as_u16(),
            "headers": headers,
            "data": data,
            "success": status.is_success(),
        })])
    }
}
