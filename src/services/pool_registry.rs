use crate::error::ConnectionError;
use crate::services::database::adapter::{Connection, PoolProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Connection pool registry: one provider per named datasource, plus a map of
/// the last connection handed out per `"{datasource}-{database}"` key.
///
/// The check-closed-then-replace sequence is a compound operation, so the slow
/// path holds the write lock across the whole of it; a closed handle is never
/// handed out twice.
pub struct PoolRegistry {
    pools: HashMap<String, Arc<dyn PoolProvider>>,
    handles: RwLock<HashMap<String, Arc<dyn Connection>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Register a named pool. The vocabulary is fixed at startup; this is not
    /// called once requests are flowing.
    pub fn register(mut self, datasource: &str, provider: Arc<dyn PoolProvider>) -> Self {
        self.pools.insert(datasource.to_string(), provider);
        self
    }

    /// Get the live connection for `(datasource, database)`, reusing the last
    /// handle while it is open and replacing it when it reports closed.
    pub async fn acquire(
        &self,
        datasource: &str,
        database: &str,
    ) -> Result<Arc<dyn Connection>, ConnectionError> {
        let key = format!("{}-{}", datasource, database);

        // Fast path: an open handle already exists (read lock)
        {
            let handles = self.handles.read().await;
            if let Some(handle) = handles.get(&key) {
                if !handle.is_closed() {
                    tracing::debug!("Reusing connection for key: {}", key);
                    return Ok(handle.clone());
                }
            }
        }

        // Slow path: borrow a fresh connection (write lock)
        let mut handles = self.handles.write().await;

        // Double-check in case another task replaced the handle while we were
        // waiting on the lock
        if let Some(handle) = handles.get(&key) {
            if !handle.is_closed() {
                tracing::debug!("Connection replaced by another task for key: {}", key);
                return Ok(handle.clone());
            }
        }

        let provider = self.pools.get(datasource).ok_or_else(|| {
            // Previous map entry is left in place so the caller's default
            // fallback path still has something to consult
            tracing::warn!("No pool registered for datasource '{}'", datasource);
            ConnectionError::UnresolvedDatasource(datasource.to_string())
        })?;

        match provider.borrow().await {
            Ok(handle) => {
                // A replacement that is itself closed means the backend is
                // unreachable; memoizing it would only hand the dead handle out
                if handle.is_closed() {
                    tracing::error!("Replacement connection for key {} is already closed", key);
                    return Err(ConnectionError::Closed(key));
                }
                tracing::info!("Borrowed fresh connection for key: {}", key);
                handles.insert(key, handle.clone());
                Ok(handle)
            }
            Err(e) => {
                tracing::error!("Failed to borrow connection for key {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// Number of memoized handles (open or not)
    pub async fn handle_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Drop all memoized handles and tear down pools that need async cleanup
    pub async fn shutdown(&self) {
        let count = {
            let mut handles = self.handles.write().await;
            let count = handles.len();
            handles.clear();
            count
        };
        tracing::info!("Released {} memoized connection handles", count);

        for (name, provider) in &self.pools {
            tracing::debug!("Shutting down pool '{}'", name);
            provider.shutdown().await;
        }
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
