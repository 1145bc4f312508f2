// Query executor facade
//
// Decorates the base executor's hook operations with the shared result cache
// and the multi-datasource connection router. The base operation is invoked
// FIRST for cache lookup/population and LAST for connection acquisition:
// transaction binding happens inside the base path, so the router's result is
// advisory, never a substitute for it.
use crate::error::{ConnectionError, QueryError};
use crate::models::{BackendKind, QueryConfig, GRAPH_DATABASE};
use crate::services::database::adapter::{Connection, PoolProvider};
use crate::services::database::graph::GraphConnector;
use crate::services::local_cache::LocalResultCache;
use crate::services::pool_registry::PoolRegistry;
use crate::services::result_cache::ResultCache;
use serde_json::Value;
use std::sync::Arc;

/// Hook contract of the underlying SQL executor. Implementations provide the
/// default cache tier and the authoritative connection-acquisition step.
#[async_trait::async_trait]
pub trait SqlBackend: Send + Sync {
    async fn get_cache(&self, sql: &str, config: &QueryConfig) -> Option<Vec<Value>>;

    async fn put_cache(&self, sql: &str, rows: &[Value], config: &QueryConfig);

    async fn remove_cache(&self, sql: &str, config: &QueryConfig);

    /// Authoritative connection acquisition; transaction binding lives here.
    async fn get_connection(
        &self,
        config: &QueryConfig,
    ) -> Result<Arc<dyn Connection>, QueryError>;

    /// Run `sql` on an already-bound connection.
    async fn execute(&self, conn: &dyn Connection, sql: &str) -> Result<Vec<Value>, QueryError> {
        conn.query(sql).await
    }
}

/// Default base executor: local in-process cache tier plus a default pool for
/// connection acquisition.
pub struct BaseExecutor {
    local: LocalResultCache,
    default_pool: Arc<dyn PoolProvider>,
}

impl BaseExecutor {
    pub fn new(local: LocalResultCache, default_pool: Arc<dyn PoolProvider>) -> Self {
        Self {
            local,
            default_pool,
        }
    }

    pub fn local_cache(&self) -> &LocalResultCache {
        &self.local
    }
}

#[async_trait::async_trait]
impl SqlBackend for BaseExecutor {
    async fn get_cache(&self, sql: &str, _config: &QueryConfig) -> Option<Vec<Value>> {
        self.local.get(sql)
    }

    async fn put_cache(&self, sql: &str, rows: &[Value], _config: &QueryConfig) {
        self.local.put(sql, rows.to_vec(), None);
    }

    async fn remove_cache(&self, sql: &str, _config: &QueryConfig) {
        self.local.remove(sql);
    }

    async fn get_connection(
        &self,
        _config: &QueryConfig,
    ) -> Result<Arc<dyn Connection>, QueryError> {
        self.default_pool.borrow().await.map_err(QueryError::from)
    }
}

/// Deployment-level graph routing settings, sourced from configuration.
/// `marker` is the `database` value that selects the graph connector;
/// `default_uri` backs any query config that carries no URI of its own.
#[derive(Debug, Clone)]
pub struct GraphRouting {
    pub marker: String,
    pub default_uri: Option<String>,
}

impl GraphRouting {
    pub fn new(marker: impl Into<String>, default_uri: Option<String>) -> Self {
        Self {
            marker: marker.into(),
            default_uri,
        }
    }
}

impl Default for GraphRouting {
    fn default() -> Self {
        Self::new(GRAPH_DATABASE, None)
    }
}

/// Orchestrates one query: cache-first reads, invalidating writes, advisory
/// multi-datasource routing.
pub struct QueryExecutor {
    base: Arc<dyn SqlBackend>,
    registry: Arc<PoolRegistry>,
    graph: Arc<GraphConnector>,
    shared_cache: Arc<ResultCache>,
    routing: GraphRouting,
}

impl QueryExecutor {
    pub fn new(
        base: Arc<dyn SqlBackend>,
        registry: Arc<PoolRegistry>,
        graph: Arc<GraphConnector>,
        shared_cache: Arc<ResultCache>,
        routing: GraphRouting,
    ) -> Self {
        Self {
            base,
            registry,
            graph,
            shared_cache,
            routing,
        }
    }

    /// Run one logical query through the full state machine:
    /// reads go cache-first, writes execute then invalidate.
    pub async fn execute_query(
        &self,
        sql: &str,
        config: &QueryConfig,
    ) -> Result<Vec<Value>, QueryError> {
        if config.method.is_write() {
            let conn = self.get_connection(config).await?;
            let rows = self.base.execute(&*conn, sql).await?;
            self.remove_cache(sql, config).await;
            return Ok(rows);
        }

        if let Some(rows) = self.get_cache(sql, config).await {
            return Ok(rows);
        }

        let conn = self.get_connection(config).await?;
        let rows = self.base.execute(&*conn, sql).await?;
        self.put_cache(sql, &rows, config).await;
        Ok(rows)
    }

    /// Base tier first, shared tier on miss.
    pub async fn get_cache(&self, sql: &str, config: &QueryConfig) -> Option<Vec<Value>> {
        if let Some(rows) = self.base.get_cache(sql, config).await {
            return Some(rows);
        }
        self.shared_cache.get(sql).await
    }

    /// Base tier first, then the shared tier's policy decides.
    pub async fn put_cache(&self, sql: &str, rows: &[Value], config: &QueryConfig) {
        self.base.put_cache(sql, rows, config).await;
        self.shared_cache.put(sql, rows, config).await;
    }

    /// Base tier first, then decay-or-delete on the shared tier.
    pub async fn remove_cache(&self, sql: &str, config: &QueryConfig) {
        self.base.remove_cache(sql, config).await;
        self.shared_cache.remove(sql, config).await;
    }

    /// Resolve a connection. Routing runs first and is advisory: its failures
    /// are logged and the base path still gets its chance. The base step runs
    /// LAST and its handle is what callers receive.
    pub async fn get_connection(
        &self,
        config: &QueryConfig,
    ) -> Result<Arc<dyn Connection>, QueryError> {
        self.route_connection(config).await;
        self.base.get_connection(config).await
    }

    async fn route_connection(&self, config: &QueryConfig) {
        // Resolve against the deployment's configured marker; the tag baked
        // into the config covers the default marker only.
        match BackendKind::resolve(&config.database, &self.routing.marker) {
            BackendKind::Graph => {
                let uri = config.uri.as_deref().or(self.routing.default_uri.as_deref());
                match uri {
                    Some(uri) => match self.graph.connect(uri, &config.database).await {
                        Ok(_handle) => {
                            // Transient, caller-owned handle: released on drop
                            tracing::debug!("Graph route resolved for {}", config.database);
                        }
                        Err(e) => {
                            tracing::warn!("Graph routing failed, falling through: {}", e);
                        }
                    },
                    None => {
                        tracing::warn!(
                            "Graph backend selected for '{}' but no URI is configured",
                            config.database
                        );
                    }
                }
            }
            BackendKind::Relational => {
                if config.datasource.is_empty() {
                    return;
                }
                match self
                    .registry
                    .acquire(&config.datasource, &config.database)
                    .await
                {
                    Ok(_handle) => {}
                    Err(ConnectionError::UnresolvedDatasource(name)) => {
                        tracing::warn!(
                            "Datasource '{}' unresolved (database '{}'), falling through",
                            name,
                            config.database
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Connection routing failed for key {}, falling through: {}",
                            config.connection_key(),
                            e
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheTransportError, ConnectorError};
    use crate::models::RequestMethod;
    use crate::services::cache_store::CacheStore;
    use crate::services::database::graph::{GraphDriver, GraphDriverFactory, GraphProps};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    #[async_trait::async_trait]
    impl CacheStore for MemoryStore {
        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl_secs: u64,
        ) -> Result<(), CacheTransportError> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl_secs));
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>, CacheTransportError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .get(key)
                .map(|(v, _)| v.clone()))
        }

        async fn delete(&self, key: &str) -> Result<(), CacheTransportError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), CacheTransportError> {
            if let Some(entry) = self.entries.lock().unwrap().get_mut(key) {
                entry.1 = ttl_secs;
            }
            Ok(())
        }
    }

    struct StubConnection;

    #[async_trait::async_trait]
    impl Connection for StubConnection {
        fn is_closed(&self) -> bool {
            false
        }

        async fn query(&self, _sql: &str) -> Result<Vec<Value>, QueryError> {
            Ok(vec![json!({"id": 42})])
        }
    }

    struct StubPool;

    #[async_trait::async_trait]
    impl PoolProvider for StubPool {
        async fn borrow(&self) -> Result<Arc<dyn Connection>, ConnectionError> {
            Ok(Arc::new(StubConnection))
        }
    }

    struct StubDriver {
        opened: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl GraphDriver for StubDriver {
        async fn connect(
            &self,
            _url: &str,
            _props: &GraphProps,
        ) -> Result<Arc<dyn Connection>, ConnectorError> {
            self.opened.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(StubConnection))
        }
    }

    struct StubFactory {
        opened: Arc<AtomicUsize>,
    }

    impl GraphDriverFactory for StubFactory {
        fn driver_for(&self, _host: &str) -> Arc<dyn GraphDriver> {
            Arc::new(StubDriver {
                opened: self.opened.clone(),
            })
        }
    }

    struct Harness {
        executor: QueryExecutor,
        store: Arc<MemoryStore>,
        graph_opens: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        harness_with(GraphRouting::default())
    }

    fn harness_with(routing: GraphRouting) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let graph_opens = Arc::new(AtomicUsize::new(0));

        let base = Arc::new(BaseExecutor::new(
            LocalResultCache::new(100, 60),
            Arc::new(StubPool),
        ));
        let registry = Arc::new(PoolRegistry::new().register("DRUID", Arc::new(StubPool)));
        let graph = Arc::new(GraphConnector::new(Arc::new(StubFactory {
            opened: graph_opens.clone(),
        })));
        let shared = Arc::new(ResultCache::new(store.clone()));

        Harness {
            executor: QueryExecutor::new(base, registry, graph, shared, routing),
            store,
            graph_opens,
        }
    }

    fn read_config(table: &str) -> QueryConfig {
        QueryConfig::new("DRUID", "db1", table, RequestMethod::Get)
    }

    #[tokio::test]
    async fn test_read_miss_executes_and_populates_both_tiers() {
        let h = harness();
        let sql = "SELECT * FROM Moment";

        let rows = h.executor.execute_query(sql, &read_config("Moment")).await.unwrap();
        assert_eq!(rows, vec![json!({"id": 42})]);

        // Shared tier was populated
        assert!(h.store.entries.lock().unwrap().contains_key(sql));
        // Second call is served from cache
        let again = h.executor.execute_query(sql, &read_config("Moment")).await.unwrap();
        assert_eq!(again, rows);
    }

    #[tokio::test]
    async fn test_shared_tier_hit_when_local_tier_misses() {
        let h = harness();
        let sql = "SELECT * FROM Moment WHERE id=9";

        // Pre-populate only the shared tier
        let payload = serde_json::to_string(&vec![json!({"id": 9})]).unwrap();
        h.store.set(sql, &payload, 60).await.unwrap();

        let rows = h.executor.get_cache(sql, &read_config("Moment")).await.unwrap();
        assert_eq!(rows, vec![json!({"id": 9})]);
    }

    #[tokio::test]
    async fn test_write_invalidates_instead_of_populating() {
        let h = harness();
        let sql = "SELECT * FROM Moment";

        h.executor.execute_query(sql, &read_config("Moment")).await.unwrap();
        assert!(h.store.entries.lock().unwrap().contains_key(sql));

        let put = QueryConfig::new("DRUID", "db1", "Moment", RequestMethod::Put);
        h.executor.execute_query(sql, &put).await.unwrap();
        assert!(!h.store.entries.lock().unwrap().contains_key(sql));
    }

    #[tokio::test]
    async fn test_delete_decays_shared_entry() {
        let h = harness();
        let sql = "SELECT * FROM User";

        let config = read_config("User");
        h.executor.execute_query(sql, &config).await.unwrap();

        let delete = QueryConfig::new("DRUID", "db1", "User", RequestMethod::Delete);
        h.executor.execute_query(sql, &delete).await.unwrap();

        // Entry still present, TTL decayed to the short bound
        let entries = h.store.entries.lock().unwrap();
        let (_, ttl) = entries.get(sql).unwrap();
        assert_eq!(*ttl, crate::services::result_cache::TTL_SHORT_SECS);
    }

    #[tokio::test]
    async fn test_unresolved_datasource_falls_through_to_base() {
        let h = harness();
        let config = QueryConfig::new("UNKNOWN", "db1", "Moment", RequestMethod::Get);

        // Router cannot resolve "UNKNOWN" but the base path still succeeds
        let rows = h.executor.execute_query("SELECT 1", &config).await.unwrap();
        assert_eq!(rows, vec![json!({"id": 42})]);
    }

    #[tokio::test]
    async fn test_graph_config_routes_through_connector_and_returns_base_handle() {
        let h = harness();
        let config = QueryConfig::new("", "NEBULA", "", RequestMethod::Get)
            .with_uri("nebula://127.0.0.1:9669/testSpace");

        let conn = h.executor.get_connection(&config).await.unwrap();
        assert!(!conn.is_closed());
        assert_eq!(h.graph_opens.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_configured_marker_routes_other_graph_databases() {
        let h = harness_with(GraphRouting::new("NEO4J", None));
        let config = QueryConfig::new("", "NEO4J", "", RequestMethod::Get)
            .with_uri("bolt://127.0.0.1:7687/graphSpace");

        h.executor.get_connection(&config).await.unwrap();
        assert_eq!(h.graph_opens.load(Ordering::Relaxed), 1);

        // The default marker is not graph-routed under a custom one
        let relational = QueryConfig::new("DRUID", "NEBULA", "Moment", RequestMethod::Get);
        h.executor.get_connection(&relational).await.unwrap();
        assert_eq!(h.graph_opens.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_configured_uri_backs_configs_without_one() {
        let h = harness_with(GraphRouting::new(
            "NEBULA",
            Some("nebula://127.0.0.1:9669/testSpace".to_string()),
        ));
        let config = QueryConfig::new("", "NEBULA", "", RequestMethod::Get);

        h.executor.get_connection(&config).await.unwrap();
        assert_eq!(h.graph_opens.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_malformed_graph_uri_still_falls_through() {
        let h = harness();
        let config = QueryConfig::new("", "NEBULA", "", RequestMethod::Get)
            .with_uri("nebula:/missing-separator");

        let conn = h.executor.get_connection(&config).await;
        assert!(conn.is_ok());
        assert_eq!(h.graph_opens.load(Ordering::Relaxed), 0);
    }
}
