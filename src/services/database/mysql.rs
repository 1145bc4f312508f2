// MySQL pool provider backed by mysql_async
use crate::error::{ConnectionError, QueryError};
use crate::services::database::adapter::{mask_credentials, Connection, PoolProvider};
use mysql_async::{prelude::*, Conn, Pool, Row, Value as MySqlValue};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct MySqlPoolProvider {
    name: String,
    pool: Pool,
}

impl MySqlPoolProvider {
    pub fn new(name: &str, connection_url: &str) -> Result<Self, ConnectionError> {
        let url = url::Url::parse(connection_url).map_err(|e| ConnectionError::Borrow {
            pool: name.to_string(),
            message: format!("invalid MySQL URL: {}", e),
        })?;

        if url.scheme() != "mysql" && url.scheme() != "mariadb" {
            return Err(ConnectionError::Borrow {
                pool: name.to_string(),
                message: "URL must use mysql:// or mariadb:// scheme".to_string(),
            });
        }

        let opts = mysql_async::Opts::from_url(connection_url).map_err(|e| {
            ConnectionError::Borrow {
                pool: name.to_string(),
                message: format!("failed to parse MySQL options: {}", e),
            }
        })?;
        let pool = Pool::new(opts);

        tracing::info!(
            "Registered mysql pool '{}' for {}",
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
impl PoolProvider for MySqlPoolProvider {
    async fn borrow(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
        let conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| ConnectionError::Borrow {
                pool: self.name.clone(),
                message: format!("failed to get MySQL connection from pool: {}", e),
            })?;

        Ok(Arc::new(MySqlConnection {
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
        }))
    }

    async fn shutdown(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            tracing::warn!("Error disconnecting mysql pool '{}': {}", self.name, e);
        }
    }
}

pub struct MySqlConnection {
    conn: Mutex<Conn>,
    // mysql_async surfaces closure through query failures, so we latch it
    closed: AtomicBool,
}

impl MySqlConnection {
    fn mysql_value_to_json(value: MySqlValue) -> Value {
        match value {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Int(v) => json!(v),
            MySqlValue::UInt(v) => json!(v),
            MySqlValue::Float(v) => json!(v),
            MySqlValue::Double(v) => json!(v),
            MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(s) => json!(s),
                Err(_) => json!("<binary>"),
            },
            other => json!(format!("{:?}", other)),
        }
    }
}

#[async_trait::async_trait]
impl Connection for MySqlConnection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Value>, QueryError> {
        let mut conn = self.conn.lock().await;

        let rows: Vec<Row> = conn.query(sql).await.map_err(|e| {
            if matches!(e, mysql_async::Error::Io(_) | mysql_async::Error::Driver(_)) {
                self.closed.store(true, Ordering::Relaxed);
            }
            QueryError::Execution(format!("{}", e))
        })?;

        // Convert rows to JSON
        let mut json_rows = Vec::new();
        for row in rows {
            let mut row_obj = serde_json::Map::new();
            let columns = row.columns_ref();

            for (idx, column) in columns.iter().enumerate() {
                let value: Value = match row.get_opt::<MySqlValue, usize>(idx) {
                    Some(Ok(mysql_val)) => Self::mysql_value_to_json(mysql_val),
                    _ => Value::Null,
                };
                row_obj.insert(column.name_str().to_string(), value);
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
    fn test_rejects_non_mysql_scheme() {
        let provider = MySqlPoolProvider::new("secondary", "postgresql://localhost:5432/db");
        assert!(provider.is_err());
    }

    #[test]
    fn test_mysql_value_to_json() {
        assert_eq!(MySqlConnection::mysql_value_to_json(MySqlValue::NULL), Value::Null);
        assert_eq!(MySqlConnection::mysql_value_to_json(MySqlValue::Int(7)), json!(7));
        assert_eq!(
            MySqlConnection::mysql_value_to_json(MySqlValue::Bytes(b"abc".to_vec())),
            json!("abc")
        );
    }
}
