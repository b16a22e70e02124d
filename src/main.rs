//! SQL agent server - main entry point.

use sql_agent_server::agent::{
    AgentContext, CategoryMap, ExecutionSettings, SchemaCatalog,
};
use sql_agent_server::config::Config;
use sql_agent_server::db::{ConnectionManager, QueryBackend};
use sql_agent_server::http::{self, AdminAuth, AppState};
use sql_agent_server::llm::{ChatCompletionsClient, TextModel, UnconfiguredModel};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

fn build_model(config: &Config) -> Result<Arc<dyn TextModel>, Box<dyn std::error::Error>> {
    match config.llm_api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            let client = ChatCompletionsClient::new(
                &config.llm_base_url,
                &config.llm_model,
                key,
                config.llm_timeout_duration(),
            )?;
            info!(model = %config.llm_model, base_url = %config.llm_base_url, "Language model configured");
            Ok(Arc::new(client))
        }
        _ => {
            warn!("LLM_API_KEY is not set; questions cannot be answered until a key is configured");
            Ok(Arc::new(UnconfiguredModel))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    info!("Starting SQL agent server v{}", env!("CARGO_PKG_VERSION"));

    let connection_config = config.connection_config()?;
    let db_type = connection_config.db_type;
    let database = connection_config.database.clone();

    let connections = Arc::new(
        ConnectionManager::connect(connection_config, config.query_timeout_duration()).await?,
    );

    let catalog = SchemaCatalog::load(&connections.pool().await, database.as_deref()).await?;
    if catalog.is_empty() {
        warn!("No tables found in the database; every question will fail");
    }

    let categories = match &config.categories_file {
        Some(path) => CategoryMap::from_json_file(path)?,
        None => CategoryMap::builtin(),
    };

    let auth = AdminAuth::from_tokens(config.effective_admin_tokens())?;
    if auth.is_enabled() {
        info!(tokens = auth.token_count(), "Admin routes require a bearer token");
    } else {
        warn!("No admin tokens configured; /direct-sql, /analytics and /clear-cache are open");
    }

    let settings = ExecutionSettings {
        cache_ttl: config.cache_ttl_duration(),
        cache_max_entries: config.cache_max_entries,
        history_size: config.history_size,
        retry_attempts: config.retry_attempts,
    };
    let backend: Arc<dyn QueryBackend> = connections.clone();
    let agent = AgentContext::new(
        catalog,
        categories,
        backend,
        build_model(&config)?,
        db_type,
        settings,
    );
    info!(
        tables = agent.catalog().len(),
        categories = ?agent.categories().names(),
        "Agent ready"
    );

    let state = AppState::new(Arc::new(agent), auth);
    if let Err(e) = http::serve(state, connections, &config.http_bind_addr()).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
