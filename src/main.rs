use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod config;
mod error;
mod models;
mod services;

use config::{Config, DatasourceConfig};
use error::ConnectionError;
use services::database::adapter::PoolProvider;
use services::database::graph::NoGraphDriver;
use services::database::mysql::MySqlPoolProvider;
use services::database::postgres::PostgresPoolProvider;
use services::database::GraphConnector;
use services::{
    BaseExecutor, GraphRouting, LocalResultCache, PoolRegistry, QueryExecutor, RedisStore,
    ResultCache,
};

fn build_provider(
    name: &str,
    ds: &DatasourceConfig,
) -> Result<Arc<dyn PoolProvider>, ConnectionError> {
    match ds.driver.as_str() {
        "mysql" => Ok(Arc::new(MySqlPoolProvider::new(name, &ds.url)?)),
        _ => Ok(Arc::new(PostgresPoolProvider::new(name, &ds.url)?)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Named relational pools, registered once at startup
    let default_pool = build_provider("default", &config.datasources.default)?;
    let fast_pool = build_provider("fast", &config.datasources.fast)?;
    let secondary_pool = build_provider("secondary", &config.datasources.secondary)?;

    let registry = Arc::new(
        PoolRegistry::new()
            .register("default", default_pool.clone())
            .register("fast", fast_pool)
            .register("secondary", secondary_pool),
    );

    // Shared result cache over Redis, bounded per-operation
    let store = RedisStore::new(
        &config.cache.redis_url,
        Duration::from_millis(config.cache.op_timeout_ms),
    )
    .map_err(|e| anyhow::anyhow!("failed to create redis client: {}", e))?;
    let shared_cache = Arc::new(ResultCache::new(Arc::new(store)));

    // Base executor: local cache tier plus the default pool
    let base = Arc::new(BaseExecutor::new(
        LocalResultCache::new(config.cache.local_max_size, config.cache.local_ttl_secs),
        default_pool,
    ));

    let graph = Arc::new(GraphConnector::new(Arc::new(NoGraphDriver)));
    let routing = GraphRouting::new(config.graph.database.clone(), config.graph.uri.clone());

    let _executor = QueryExecutor::new(base, registry.clone(), graph, shared_cache, routing);

    info!(
        "Query core initialized (graph database marker: {})",
        config.graph.database
    );

    // Run until interrupted, then tear down pools explicitly
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    registry.shutdown().await;

    Ok(())
}
