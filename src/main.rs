/// Flowgate: workflow orchestration engine
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server with workflow management and execution endpoints:
/// - Workflow CRUD at /api/workflows/*
/// - Execution triggering at /api/workflows/{id}/run and /submit
/// - Execution lookup at /api/executions/{id}, stats at /api/stats
/// - Health check at /healthz

use flowgate::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    start_server(config).await?;
    Ok(())
}
