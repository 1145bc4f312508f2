// Graph database connector
//
// Graph backends are reached through a driver scoped to the host, with the
// connection opened against a rewritten URI naming the graph space instead of
// the host. Connections from this path are not pooled; the caller owns the
// handle and must release it.
use crate::error::ConnectorError;
use crate::services::database::adapter::Connection;
use std::sync::Arc;

/// Parsed form of `scheme://host[:port]/space`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphUri {
    pub prefix: String,
    pub host: String,
    pub space: String,
}

impl GraphUri {
    /// Parse a raw graph URI, rejecting half-formed input before any
    /// connection attempt is made.
    pub fn parse(raw: &str) -> Result<Self, ConnectorError> {
        let (prefix, rest) = raw
            .split_once("://")
            .ok_or_else(|| ConnectorError::MalformedUri {
                uri: raw.to_string(),
                reason: "missing '://'",
            })?;

        let (host, space) = rest
            .split_once('/')
            .ok_or_else(|| ConnectorError::MalformedUri {
                uri: raw.to_string(),
                reason: "missing '/' after host",
            })?;

        if prefix.is_empty() || host.is_empty() || space.is_empty() {
            return Err(ConnectorError::MalformedUri {
                uri: raw.to_string(),
                reason: "empty scheme, host or graph space",
            });
        }

        Ok(Self {
            prefix: prefix.to_string(),
            host: host.to_string(),
            space: space.to_string(),
        })
    }

    /// Connection URL handed to the driver: `scheme://space`
    pub fn url(&self) -> String {
        format!("{}://{}", self.prefix, self.space)
    }
}

/// Connection properties passed to the graph driver
#[derive(Debug, Clone)]
pub struct GraphProps {
    pub url: String,
    pub graph_space: String,
}

/// Protocol driver for the graph backend, scoped to a single `host[:port]`
#[async_trait::async_trait]
pub trait GraphDriver: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        props: &GraphProps,
    ) -> Result<Arc<dyn Connection>, ConnectorError>;
}

/// Builds a driver instance for a given `host[:port]`
pub trait GraphDriverFactory: Send + Sync {
    fn driver_for(&self, host: &str) -> Arc<dyn GraphDriver>;
}

/// Backend connector for the graph database path
pub struct GraphConnector {
    factory: Arc<dyn GraphDriverFactory>,
}

impl GraphConnector {
    pub fn new(factory: Arc<dyn GraphDriverFactory>) -> Self {
        Self { factory }
    }

    /// Open a transient connection for `raw_uri`. `database` is only used for
    /// log context.
    pub async fn connect(
        &self,
        raw_uri: &str,
        database: &str,
    ) -> Result<Arc<dyn Connection>, ConnectorError> {
        let uri = GraphUri::parse(raw_uri)?;

        let props = GraphProps {
            url: uri.url(),
            graph_space: uri.space.clone(),
        };

        tracing::debug!(
            "Opening graph connection: database={}, host={}, url={}, space={}",
            database,
            uri.host,
            props.url,
            props.graph_space
        );

        let driver = self.factory.driver_for(&uri.host);
        driver.connect(&props.url, &props).await
    }
}

/// Factory for deployments with no graph backend: every connect attempt fails
/// with a driver error, which the facade logs and falls through.
pub struct NoGraphDriver;

#[async_trait::async_trait]
impl GraphDriver for NoGraphDriver {
    async fn connect(
        &self,
        _url: &str,
        _props: &GraphProps,
    ) -> Result<Arc<dyn Connection>, ConnectorError> {
        Err(ConnectorError::Driver(
            "no graph driver configured for this deployment".to_string(),
        ))
    }
}

impl GraphDriverFactory for NoGraphDriver {
    fn driver_for(&self, _host: &str) -> Arc<dyn GraphDriver> {
        Arc::new(NoGraphDriver)
    }
}
