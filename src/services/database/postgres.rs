// PostgreSQL pool provider backed by deadpool
use crate::error::{ConnectionError, QueryError};
use crate::services::database::adapter::{mask_credentials, Connection, PoolProvider};
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Object, Pool, RecyclingMethod};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_postgres::NoTls;

pub struct PostgresPoolProvider {
    name: String,
    pool: Pool,
}

impl PostgresPoolProvider {
    pub fn new(name: &str, connection_url: &str) -> Result<Self, ConnectionError> {
        let url = url::Url::parse(connection_url).map_err(|e| ConnectionError::Borrow {
            pool: name.to_string(),
            message: format!("invalid PostgreSQL URL: {}", e),
        })?;

        if url.scheme() != "postgresql" && url.scheme() != "postgres" {
            return Err(ConnectionError::Borrow {
                pool: name.to_string(),
                message: "URL must use postgresql:// or postgres:// scheme".to_string(),
            });
        }

        let mut cfg = PoolConfig::new();
        cfg.url = Some(connection_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| {
                tracing::error!("Failed to create connection pool for {}: {}", name, e);
                ConnectionError::Borrow {
                    pool: name.to_string(),
                    message: format!("failed to create connection pool: {}", e),
                }
            })?;

        tracing::info!(
            "Registered postgres pool '{}' for {}",
            name,
            mask_credentials(connection_url)
        );

        Ok(Self {
            name: name.to_string(),
            pool,
        })
    }
}

#[async_trait::async_trait]
impl PoolProvider for PostgresPoolProvider {
    async fn borrow(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        // Bounded wait comes from the pool's own configuration
        let client = self.pool.get().await.map_err(|e| ConnectionError::Borrow {
            pool: self.name.clone(),
            message: format!("failed to get connection from pool: {}", e),
        })?;

        Ok(Arc::new(PostgresConnection { client }))
    }
}

pub struct PostgresConnection {
    client: Object,
}

#[async_trait::async_trait]
impl Connection for PostgresConnection {
    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn query(&self, sql: &str) -> Result<Vec<Value>, QueryError> {
        let rows = self.client.query(sql, &[]).await.map_err(|e| {
            let message = if let Some(db_error) = e.as_db_error() {
                format!("code: {}, message: {}", db_error.code().code(), db_error.message())
            } else {
                format!("{}", e)
            };
            QueryError::Execution(message)
        })?;

        // Convert rows to JSON
        let mut json_rows = Vec::new();
        for row in rows {
            let mut row_obj = serde_json::Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                let value: Value = match *column.type_() {
                    tokio_postgres::types::Type::INT2 => row
                        .get::<_, Option<i16>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    tokio_postgres::types::Type::INT4 => row
                        .get::<_, Option<i32>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    tokio_postgres::types::Type::INT8 => row
                        .get::<_, Option<i64>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    tokio_postgres::types::Type::FLOAT4 => row
                        .get::<_, Option<f32>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    tokio_postgres::types::Type::FLOAT8 => row
                        .get::<_, Option<f64>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    tokio_postgres::types::Type::BOOL => row
                        .get::<_, Option<bool>>(idx)
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    _ => {
                        // TEXT, VARCHAR, TIMESTAMP, UUID, JSON and friends:
                        // fall back to a string representation
                        match row.try_get::<_, Option<String>>(idx) {
                            Ok(Some(v)) => json!(v),
                            Ok(None) => Value::Null,
                            Err(_) => json!(format!("<{}>", column.type_().name())),
                        }
                    }
                };
                row_obj.insert(column.name().to_string(), value);
            }
            json_rows.push(Value::Object(row_obj));
        }

        Ok(json_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_postgres_scheme() {
        let provider = PostgresPoolProvider::new("default", "mysql://localhost:3306/db");
        assert!(provider.is_err());
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let provider = PostgresPoolProvider::new("default", "not a url");
        assert!(provider.is_err());
    }
}
