// Shared result cache with backend-specific TTL and invalidation policy
//
// Everything here is best-effort: a cache outage degrades performance, never
// correctness. Any transport or serialization failure is logged and treated
// as if the cache were empty for that operation.
use crate::error::CacheTransportError;
use crate::models::{QueryConfig, RequestMethod};
use crate::services::cache_store::CacheStore;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// TTL for explain/existence-check results and hot low-churn identity tables
pub const TTL_LONG_SECS: u64 = 600;
/// Default TTL bounding staleness for everything else, also the decay TTL
/// applied on DELETE
pub const TTL_SHORT_SECS: u64 = 60;

/// Tables whose data must always be read fresh (dynamic config tables)
const NON_CACHEABLE_TABLES: &[&str] = &["Access", "Function", "Request"];
/// Hot, low-churn identity tables worth holding longer
const SENSITIVE_TABLES: &[&str] = &["User", "Privacy"];

pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    non_cacheable: HashSet<String>,
    sensitive: HashSet<String>,
    // Serializes put/remove so concurrent requests cannot interleave partial
    // cache states; get stays concurrent.
    write_lock: Mutex<()>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_table_sets(store, NON_CACHEABLE_TABLES, SENSITIVE_TABLES)
    }

    pub fn with_table_sets(
        store: Arc<dyn CacheStore>,
        non_cacheable: &[&str],
        sensitive: &[&str],
    ) -> Self {
        Self {
            store,
            non_cacheable: non_cacheable.iter().map(|t| t.to_lowercase()).collect(),
            sensitive: sensitive.iter().map(|t| t.to_lowercase()).collect(),
            write_lock: Mutex::new(()),
        }
    }

    /// Look up cached rows for `sql`. Transport faults report as absent.
    pub async fn get(&self, sql: &str) -> Option<Vec<Value>> {
        match self.try_get(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Shared cache get failed, treating as miss: {}", e);
                None
            }
        }
    }

    async fn try_get(&self, sql: &str) -> Result<Option<Vec<Value>>, CacheTransportError> {
        match self.store.get(sql).await? {
            Some(payload) => {
                let rows: Vec<Value> = serde_json::from_str(&payload)?;
                tracing::debug!("Shared cache hit ({} rows)", rows.len());
                Ok(Some(rows))
            }
            None => Ok(None),
        }
    }

    /// Store `rows` under `sql` with a policy-selected TTL. Only the main
    /// table of a request is cached; sub-query/joined fragments are not, to
    /// avoid cache-key explosion.
    pub async fn put(&self, sql: &str, rows: &[Value], config: &QueryConfig) {
        if !config.main_table || config.table.is_empty() {
            return;
        }
        if self.non_cacheable.contains(&config.table.to_lowercase()) {
            tracing::debug!("Table '{}' is non-cacheable, skipping", config.table);
            return;
        }

        let _guard = self.write_lock.lock().await;

        let ttl = self.ttl_for(config);
        let result = async {
            let payload = serde_json::to_string(rows)?;
            self.store.set(sql, &payload, ttl).await
        }
        .await;

        match result {
            Ok(()) => tracing::debug!("Shared cache populated (ttl: {}s)", ttl),
            Err(e) => tracing::warn!("Shared cache put failed, skipping: {}", e),
        }
    }

    /// Invalidate the entry for `sql` after a write. DELETE decays the entry
    /// to a short TTL instead of dropping it, so a burst of repeated deletes
    /// cannot stampede the backend on the next read; POST/PUT delete outright.
    pub async fn remove(&self, sql: &str, config: &QueryConfig) {
        let _guard = self.write_lock.lock().await;

        let result = if config.method == RequestMethod::Delete {
            self.store.expire(sql, TTL_SHORT_SECS).await
        } else {
            self.store.delete(sql).await
        };

        if let Err(e) = result {
            tracing::warn!("Shared cache invalidation failed, skipping: {}", e);
        }
    }

    fn ttl_for(&self, config: &QueryConfig) -> u64 {
        if config.explain || config.method.is_head_like() {
            return TTL_LONG_SECS;
        }
        if self.sensitive.contains(&config.table.to_lowercase()) {
            TTL_LONG_SECS
        } else {
            TTL_SHORT_SECS
        }
    }
}
