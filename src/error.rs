use std::time::Duration;
use thiserror::Error;

/// Connection routing errors (pool resolution and borrow failures)
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no datasource registered under name '{0}'")]
    UnresolvedDatasource(String),

    #[error("failed to borrow connection from pool '{pool}': {message}")]
    Borrow { pool: String, message: String },

    #[error("connection for '{0}' is closed and could not be replaced")]
    Closed(String),
}

/// Graph backend connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("malformed graph URI '{uri}': {reason}")]
    MalformedUri { uri: String, reason: &'static str },

    #[error("graph driver error: {0}")]
    Driver(String),
}

/// External cache transport errors
///
/// Never surfaced to callers: every variant is absorbed at the cache
/// boundary and degrades to a miss/no-op.
#[derive(Debug, Error)]
pub enum CacheTransportError {
    #[error("failed to serialize cached rows: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache transport failed: {0}")]
    Transport(String),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for CacheTransportError {
    fn from(err: redis::RedisError) -> Self {
        CacheTransportError::Transport(err.to_string())
    }
}

/// Errors surfaced to the caller of the executor facade
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("query execution failed: {0}")]
    Execution(String),
}
