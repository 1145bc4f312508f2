// External shared cache client
//
// The store contract is intentionally small: any string-keyed TTL cache can
// stand in for Redis here, which is also how the tests exercise the policy
// layer without a live server.
use crate::error::CacheTransportError;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// String-keyed TTL cache used as the shared result-cache tier
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64)
        -> Result<(), CacheTransportError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheTransportError>;

    async fn delete(&self, key: &str) -> Result<(), CacheTransportError>;

    /// Reset the TTL of an existing entry without touching its value
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), CacheTransportError>;
}

/// Redis-backed store with a multiplexed connection reused across calls and a
/// hard per-operation timeout so a slow cache can never stall a query.
pub struct RedisStore {
    client: Arc<redis::Client>,
    connection: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
    op_timeout: Duration,
}

impl RedisStore {
    pub fn new(redis_url: &str, op_timeout: Duration) -> Result<Self, CacheTransportError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client: Arc::new(client),
            connection: Arc::new(RwLock::new(None)),
            op_timeout,
        })
    }

    async fn get_connection(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, CacheTransportError> {
        {
            let conn = self.connection.read().await;
            if let Some(conn) = conn.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut slot = self.connection.write().await;
        if slot.is_none() {
            let conn = self.client.get_multiplexed_async_connection().await?;
            *slot = Some(conn);
        }
        Ok(slot
            .as_ref()
            .ok_or_else(|| CacheTransportError::Transport("connection slot empty".into()))?
            .clone())
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, CacheTransportError>
    where
        F: Future<Output = Result<T, CacheTransportError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| CacheTransportError::Timeout(self.op_timeout))?
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisStore {
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), CacheTransportError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let _: () = conn.set_ex(key, value, ttl_secs).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheTransportError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheTransportError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let _: () = conn.del(key).await?;
            Ok(())
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), CacheTransportError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let _: () = conn.expire(key, ttl_secs as i64).await?;
            Ok(())
        })
        .await
    }
}
