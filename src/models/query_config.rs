use serde::{Deserialize, Serialize};

/// Database value that routes a query to the graph connector instead of a
/// relational pool.
pub const GRAPH_DATABASE: &str = "NEBULA";

/// Request method of a logical query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    /// Existence/count-check reads (HEAD-like)
    pub fn is_head_like(&self) -> bool {
        matches!(self, RequestMethod::Head)
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RequestMethod::Post | RequestMethod::Put | RequestMethod::Delete
        )
    }
}

/// Which kind of backend a config routes to, resolved once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// One of the named relational pools
    Relational,
    /// Graph database reached through the backend connector
    Graph,
}

impl BackendKind {
    /// Resolve the backend kind for a `database` value against a deployment's
    /// graph marker. Membership is case-insensitive.
    pub fn resolve(database: &str, graph_marker: &str) -> Self {
        if database.eq_ignore_ascii_case(graph_marker) {
            BackendKind::Graph
        } else {
            BackendKind::Relational
        }
    }
}

/// Immutable description of one logical query, produced by the caller per
/// request. `backend` is derived from `database` when the config is built so
/// the hot path dispatches on a tagged variant rather than comparing strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub datasource: String,
    pub database: String,
    /// Primary table; empty for joins/raw SQL
    pub table: String,
    pub method: RequestMethod,
    pub explain: bool,
    /// Whether `table` is the primary table of the request, as opposed to a
    /// joined/sub-object fragment
    pub main_table: bool,
    /// Raw backend URI for non-pooled backends (graph)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip)]
    backend: Option<BackendKind>,
}

impl QueryConfig {
    pub fn new(
        datasource: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        method: RequestMethod,
    ) -> Self {
        let database = database.into();
        let backend = Some(Self::resolve_backend(&database));
        Self {
            datasource: datasource.into(),
            database,
            table: table.into(),
            method,
            explain: false,
            main_table: true,
            uri: None,
            backend,
        }
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn with_main_table(mut self, main_table: bool) -> Self {
        self.main_table = main_table;
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn backend(&self) -> BackendKind {
        // Falls back to re-resolution for configs built via deserialization
        self.backend
            .unwrap_or_else(|| Self::resolve_backend(&self.database))
    }

    fn resolve_backend(database: &str) -> BackendKind {
        BackendKind::resolve(database, GRAPH_DATABASE)
    }

    /// Composite key the pool registry memoizes handles under
    pub fn connection_key(&self) -> String {
        format!("{}-{}", self.datasource, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_resolved_at_construction() {
        let config = QueryConfig::new("DRUID", "db1", "Moment", RequestMethod::Get);
        assert_eq!(config.backend(), BackendKind::Relational);

        let config = QueryConfig::new("", "NEBULA", "", RequestMethod::Get);
        assert_eq!(config.backend(), BackendKind::Graph);

        // Case-insensitive marker
        let config = QueryConfig::new("", "nebula", "", RequestMethod::Get);
        assert_eq!(config.backend(), BackendKind::Graph);
    }

    #[test]
    fn test_resolve_honors_custom_marker() {
        assert_eq!(BackendKind::resolve("NEO4J", "NEO4J"), BackendKind::Graph);
        assert_eq!(BackendKind::resolve("neo4j", "NEO4J"), BackendKind::Graph);
        // The default marker is just another database name under a custom one
        assert_eq!(
            BackendKind::resolve("NEBULA", "NEO4J"),
            BackendKind::Relational
        );
    }

    #[test]
    fn test_connection_key() {
        let config = QueryConfig::new("DRUID", "db1", "Moment", RequestMethod::Get);
        assert_eq!(config.connection_key(), "DRUID-db1");
    }

    #[test]
    fn test_method_classification() {
        assert!(RequestMethod::Head.is_head_like());
        assert!(!RequestMethod::Get.is_head_like());
        assert!(RequestMethod::Post.is_write());
        assert!(RequestMethod::Put.is_write());
        assert!(RequestMethod::Delete.is_write());
        assert!(!RequestMethod::Get.is_write());
    }
}
