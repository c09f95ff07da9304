//! Client configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) yields a client for `http://localhost:9200`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seed nodes as `host:port` or full URLs. When non-empty, requests
    /// rotate over these and `host`/`port` are ignored.
    #[serde(default)]
    pub nodes: Vec<String>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9200
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Whole-request timeout; unset means no limit
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: None,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrollConfig {
    /// Engine time unit string, e.g. `"1m"` or `"30s"`
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
}

fn default_keep_alive() -> String {
    "1m".to_string()
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            keep_alive: default_keep_alive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::Config(format!("unknown log format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive; overridden by RUST_LOG
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format; overridden by LOG_FORMAT
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load from a TOML file, or defaults if it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        match self.endpoint.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "endpoint.scheme must be http or https, got '{}'",
                    other
                )))
            }
        }
        if self.endpoint.host.trim().is_empty() && self.endpoint.nodes.is_empty() {
            return Err(Error::Config("endpoint.host must not be empty".to_string()));
        }
        if self.scroll.keep_alive.trim().is_empty() {
            return Err(Error::Config("scroll.keep_alive must not be empty".to_string()));
        }
        Ok(())
    }
}
