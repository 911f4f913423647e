/// Execution REST endpoints
///
/// Two trigger shapes: `run` blocks until the run finishes (bounded by the
/// request's `timeout_ms`, answering 408 when the wait — not the run — times
/// out), `submit` answers immediately with the execution id. Lookup serves
/// the full execution while it is retained and falls back to the compact
/// history summary afterwards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::error::EngineError;
use crate::runtime::execution::ExecutionOptions;

#[derive(Debug, Deserialize, Default)]
pub struct RunRequest {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub options: Option<ExecutionOptions>,
}

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows/{id}/run", post(run_workflow))
        .route("/api/workflows/{id}/submit", post(submit_workflow))
        .route("/api/executions/{id}", get(get_execution))
        .route("/api/stats", get(get_stats))
}

fn error_response(error: EngineError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        EngineError::WaitTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
        EngineError::ExecutionNotFound(_) | EngineError::WorkflowNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "error": error.to_string() })))
}

/// POST /api/workflows/{id}/run
/// Body: { "input": <json>, "options": { "timeout_ms": 30000, ... } }
async fn run_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let compiled = state
        .graphs
        .get(&id)
        .ok_or_else(|| error_response(EngineError::WorkflowNotFound(id.clone())))?;

    let options = request.options.unwrap_or_default();
    let execution = state
        .queue
        .execute_workflow(compiled.graph, request.input, options)
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::to_value(execution).unwrap_or(Value::Null)))
}

/// POST /api/workflows/{id}/submit — fire and forget, returns the id.
async fn submit_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let compiled = state
        .graphs
        .get(&id)
        .ok_or_else(|| error_response(EngineError::WorkflowNotFound(id.clone())))?;

    let options = request.options.unwrap_or_default();
    let execution_id = state
        .queue
        .submit(compiled.graph, request.input, options)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "execution_id": execution_id, "status": "pending" })))
}

/// GET /api/executions/{id}
async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if let Some(execution) = state.executions.snapshot(&id).await {
        return Ok(Json(serde_json::to_value(execution).unwrap_or(Value::Null)));
    }
    match state.executions.find_summary(&id).await {
        Some(summary) => Ok(Json(serde_json::to_value(summary).unwrap_or(Value::Null))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.executions.stats().await;
    Json(serde_json::to_value(stats).unwrap_or(Value::Null))
}
