/// Server setup and initialization
///
/// Wires together all components: storage, registries, dispatcher, execution
/// queue and HTTP routes. Provides the application factory used by both the
/// binary and the integration tests.

use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::{
    api::{create_execution_routes, create_workflow_routes, AppState},
    config::Config,
    runtime::{
        dispatcher::NodeDispatcher,
        events::{ExecutionEvent, ExecutionEvents},
        handlers::{
            DataReadHandler, DataWriteHandler, HttpRequestHandler, LuaScriptHandler,
            SetFieldsHandler,
        },
        queue::ExecutionQueue,
        registry::ExecutionRegistry,
        retry::RetryController,
    },
    workflow::{registry::GraphRegistry, storage::WorkflowStorage},
};

/// Build the dispatcher with every built-in node type registered.
pub fn build_dispatcher(pool: sqlx::SqlitePool) -> NodeDispatcher {
    let mut dispatcher = NodeDispatcher::new();
    dispatcher.register("http.request", Arc::new(HttpRequestHandler::new()));
    dispatcher.register("script.lua", Arc::new(LuaScriptHandler));
    dispatcher.register("transform.set", Arc::new(SetFieldsHandler));
    dispatcher.register("data.write", Arc::new(DataWriteHandler::new(pool.clone())));
    dispatcher.register("data.read", Arc::new(DataReadHandler::new(pool)));
    dispatcher
}

/// Create the Axum application with all components wired together.
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 ensuring data directory exists: {}", config.database.data_dir);
    std::fs::create_dir_all(&config.database.data_dir)
        .map_err(|e| anyhow::anyhow!("failed to create data directory: {}", e))?;

    tracing::info!("🗄️ opening database {}", config.database_url());
    let options = SqliteConnectOptions::from_str(&config.database_url())?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let storage = Arc::new(WorkflowStorage::new(pool.clone()));
    storage.init_schema().await?;

    tracing::info!("📥 loading workflows from storage");
    let graphs = Arc::new(GraphRegistry::init_from_storage(&storage).await?);

    let events = Arc::new(ExecutionEvents::new());
    spawn_event_logger(&events).await;

    let executions = Arc::new(ExecutionRegistry::new(
        config.engine.history_limit,
        Duration::from_secs(config.engine.retention_secs),
    ));

    let dispatcher = Arc::new(build_dispatcher(pool));
    let controller = Arc::new(RetryController::new(
        dispatcher,
        events,
        Arc::clone(&executions),
    ));
    let queue = Arc::new(ExecutionQueue::new(
        controller,
        Arc::clone(&executions),
        config.engine.max_concurrent_executions,
        Duration::from_millis(config.engine.retry_delay_ms),
    ));

    let state = AppState {
        storage,
        graphs,
        queue,
        executions,
    };

    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes().with_state(state.clone()))
        .merge(create_execution_routes().with_state(state));

    tracing::info!("✅ application initialized");
    Ok(app)
}

/// Background observer that turns lifecycle events into log lines.
async fn spawn_event_logger(events: &Arc<ExecutionEvents>) {
    let mut rx = events.subscribe().await;
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ExecutionEvent::Started { id, graph_id } => {
                    tracing::info!("▶️ execution {} started (graph: {})", id, graph_id);
                }
                ExecutionEvent::Completed { execution } => {
                    tracing::info!(
                        "🏁 execution {} completed ({} node results)",
                        execution.id,
                        execution.node_results.len()
                    );
                }
                ExecutionEvent::Failed { execution } => {
                    tracing::warn!(
                        "🏁 execution {} failed after {} retr{}: {}",
                        execution.id,
                        execution.retry_count,
                        if execution.retry_count == 1 { "y" } else { "ies" },
                        execution.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }
    });
}

/// Start the HTTP server with the given configuration.
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Flowgate server...");
    let app = create_app(config.clone()).await?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
