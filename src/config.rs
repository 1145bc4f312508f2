use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub datasources: DatasourcesConfig,
    pub cache: CacheConfig,
    pub graph: GraphConfig,
    pub logging: LoggingConfig,
}

/// Named relational datasources registered with the pool registry at startup.
/// The vocabulary is small and fixed; each entry selects a driver and a URL.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasourcesConfig {
    pub default: DatasourceConfig,
    pub fast: DatasourceConfig,
    pub secondary: DatasourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasourceConfig {
    pub url: String,
    /// "postgres" or "mysql"
    pub driver: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    /// Max entries in the local in-process tier
    pub local_max_size: usize,
    /// Default TTL for local-tier entries, in seconds
    pub local_ttl_secs: u64,
    /// Hard bound on each external-cache round trip, in milliseconds
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// The `database` value that routes a query to the graph connector
    pub database: String,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("datasources.default.url", "postgresql://localhost:5432/app")?
            .set_default("datasources.default.driver", "postgres")?
            .set_default("datasources.fast.url", "postgresql://localhost:5432/app_fast")?
            .set_default("datasources.fast.driver", "postgres")?
            .set_default("datasources.secondary.url", "mysql://localhost:3306/app")?
            .set_default("datasources.secondary.driver", "mysql")?
            .set_default("cache.redis_url", "redis://127.0.0.1:6379")?
            .set_default("cache.local_max_size", 1000)?
            .set_default("cache.local_ttl_secs", 300)?
            .set_default("cache.op_timeout_ms", 500)?
            .set_default("graph.database", "NEBULA")?
            .set_default("logging.level", "info")?;

        // Load .env first so its values are visible to the overrides below
        let _ = dotenv::dotenv();

        // Load from environment variables
        if let Ok(url) = env::var("DATABASE_URL") {
            builder = builder.set_override("datasources.default.url", url)?;
        }

        if let Ok(url) = env::var("DATABASE_URL_FAST") {
            builder = builder.set_override("datasources.fast.url", url)?;
        }

        if let Ok(url) = env::var("DATABASE_URL_SECONDARY") {
            builder = builder.set_override("datasources.secondary.url", url)?;
        }

        if let Ok(redis_url) = env::var("REDIS_URL") {
            builder = builder.set_override("cache.redis_url", redis_url)?;
        }

        if let Ok(uri) = env::var("GRAPH_URI") {
            builder = builder.set_override("graph.uri", Some(uri))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        env::remove_var("DATABASE_URL");
        env::remove_var("REDIS_URL");
        env::remove_var("GRAPH_URI");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.cache.local_max_size, 1000);
        assert_eq!(config.cache.op_timeout_ms, 500);
        assert_eq!(config.graph.database, "NEBULA");
        assert_eq!(config.datasources.default.driver, "postgres");
    }
}
