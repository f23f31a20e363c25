use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use sql_agent::agent::{ApprovalMode, PendingApprovals, SqlAgent};
use sql_agent::config::Config;
use sql_agent::db::SqlDatabase;
use sql_agent::llm::build_model;
use sql_agent::server::{router, ServiceState};
use sql_agent::tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    sql_agent::logging::init(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "SQL Agent service starting..."
    );

    if config.langsmith.tracing {
        info!(
            endpoint = %config.langsmith.endpoint,
            project = %config.langsmith.project,
            "LangSmith credentials loaded (pass-through only)"
        );
    }

    // Connect to the database
    let db = match SqlDatabase::connect(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to SQLite database");
            return Err(e.into());
        }
    };

    // Log the available tables
    match db.list_tables().await {
        Ok(tables) => info!(?tables, "DATABASE TABLES"),
        Err(e) => warn!(error = %e, "Could not fetch tables list"),
    }

    // Initialize the LLM client
    let model = match build_model(&config.llm) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "Failed to initialize LLM client");
            return Err(e.into());
        }
    };

    // Interactive agent: every generated query waits for approval
    let agent = Arc::new(SqlAgent::new(
        model,
        ToolRegistry::new(db.clone()),
        ApprovalMode::Required,
        &config.agent,
    ));

    let approvals = PendingApprovals::new(
        config
            .agent
            .approval_timeout_secs
            .map(Duration::from_secs),
    );

    let state = Arc::new(ServiceState {
        db,
        agent,
        approvals,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Server ready, waiting for requests...");

    axum::serve(listener, router(state)).await?;

    info!("Server shutdown complete");
    Ok(())
}
