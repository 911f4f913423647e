/// Workflow management REST endpoints
///
/// CRUD over workflow graphs with compile-on-deploy: a graph is validated and
/// planned before it is persisted or published, so a graph that fails
/// validation (or contains a cycle) is rejected with 400 and never reaches
/// the registry.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::workflow::registry::CompiledGraph;
use crate::workflow::types::WorkflowGraph;

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}", put(update_workflow))
        .route("/api/workflows/{id}", delete(delete_workflow))
}

/// Compile, persist and publish in that order; nothing is written when
/// compilation fails.
async fn deploy(
    state: &AppState,
    graph: WorkflowGraph,
) -> Result<CompiledGraph, (StatusCode, Json<Value>)> {
    let graph_for_storage = graph.clone();
    let compiled = state.graphs.deploy(graph).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    if let Err(e) = state.storage.save(&graph_for_storage).await {
        tracing::error!("failed to persist workflow: {}", e);
        // Roll the registry back so memory and storage stay consistent.
        state.graphs.remove(&graph_for_storage.id);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to persist workflow" })),
        ));
    }
    Ok(compiled)
}

/// POST /api/workflows
/// Body: { "id": "...", "name": "...", "nodes": [...], "connections": [...] }
async fn create_workflow(
    State(state): State<AppState>,
    Json(graph): Json<WorkflowGraph>,
) -> Result<Json<WorkflowResponse>, (StatusCode, Json<Value>)> {
    if state.graphs.get(&graph.id).is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("workflow '{}' already exists", graph.id) })),
        ));
    }

    let compiled = deploy(&state, graph).await?;
    tracing::info!(
        "🔥 deployed workflow '{}' ({} nodes)",
        compiled.graph.id,
        compiled.graph.nodes.len()
    );
    Ok(Json(WorkflowResponse {
        id: compiled.graph.id.clone(),
        message: format!("Workflow '{}' created successfully", compiled.graph.name),
    }))
}

/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "workflows": state.graphs.list_ids() }))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowGraph>, StatusCode> {
    match state.graphs.get(&id) {
        Some(compiled) => Ok(Json((*compiled.graph).clone())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// PUT /api/workflows/{id}
async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut graph): Json<WorkflowGraph>,
) -> Result<Json<WorkflowResponse>, (StatusCode, Json<Value>)> {
    if state.graphs.get(&id).is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("workflow '{}' not found", id) })),
        ));
    }
    // The path parameter wins over whatever id the body carries.
    graph.id = id;

    let compiled = deploy(&state, graph).await?;
    tracing::info!("🔥 redeployed workflow '{}'", compiled.graph.id);
    Ok(Json(WorkflowResponse {
        id: compiled.graph.id.clone(),
        message: format!("Workflow '{}' updated successfully", compiled.graph.name),
    }))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let removed = state.graphs.remove(&id);
    match state.storage.delete(&id).await {
        Ok(existed) => {
            if !removed && !existed {
                return Err(StatusCode::NOT_FOUND);
            }
            tracing::info!("🗑️ deleted workflow '{}'", id);
            Ok(Json(json!({ "message": "Workflow deleted successfully" })))
        }
        Err(e) => {
            tracing::error!("failed to delete workflow '{}': {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
