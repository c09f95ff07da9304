//! Endpoint resolution
//!
//! The transport asks a resolver for the base URL before every request, so a
//! resolver can rotate over nodes or look them up elsewhere.

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    pub fn http(host: impl Into<String>, port: u16) -> Self {
        Self::new("http", host, port)
    }

    /// Parse `http://host:port`, or a bare `host:port` (scheme defaults to
    /// `default_scheme`, port to 9200)
    pub fn parse(s: &str, default_scheme: &str) -> Result<Self> {
        let s = s.trim();
        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("{}://{}", default_scheme, s)
        };
        let url = Url::parse(&with_scheme)?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("endpoint '{}' has no host", s)))?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port: url.port().unwrap_or(9200),
        })
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.to_string())?)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Supplies the engine endpoint for the next request
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self) -> Result<Endpoint>;
}

/// Always the same endpoint
#[derive(Debug, Clone)]
pub struct StaticEndpoint(Endpoint);

impl StaticEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        Self(endpoint)
    }
}

#[async_trait]
impl EndpointResolver for StaticEndpoint {
    async fn resolve(&self) -> Result<Endpoint> {
        Ok(self.0.clone())
    }
}

/// Rotates over a fixed list of nodes
#[derive(Debug)]
pub struct RoundRobinEndpoints {
    nodes: Vec<Endpoint>,
    next: AtomicUsize,
}

impl RoundRobinEndpoints {
    pub fn new(nodes: Vec<Endpoint>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::Config("no endpoint nodes configured".to_string()));
        }
        Ok(Self {
            nodes,
            next: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EndpointResolver for RoundRobinEndpoints {
    async fn resolve(&self) -> Result<Endpoint> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        Ok(self.nodes[i].clone())
    }
}

/// Static resolver for `host`/`port`, or round-robin over `nodes` when set
pub fn resolver_from_config(config: &EndpointConfig) -> Result<Arc<dyn EndpointResolver>> {
    if config.nodes.is_empty() {
        let endpoint = Endpoint::new(&config.scheme, &config.host, config.port);
        return Ok(Arc::new(StaticEndpoint::new(endpoint)));
    }
    let nodes = config
        .nodes
        .iter()
        .map(|n| Endpoint::parse(n, &config.scheme))
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(RoundRobinEndpoints::new(nodes)?))
}
