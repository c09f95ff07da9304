//! esbridge: async REST client for Elasticsearch-compatible engines
//!
//! Requests are built with the typed DSL from [`esbridge_dsl`] (re-exported as
//! [`dsl`]), sent over HTTP by [`EsClient`], and the engine's JSON responses
//! come back as typed results.
//!
//! ```no_run
//! use esbridge::dsl::{Query, SearchRequest};
//! use esbridge::{Document, Endpoint, EsClient};
//!
//! # async fn run() -> esbridge::Result<()> {
//! let client = EsClient::new(Endpoint::http("localhost", 9200))?;
//! client
//!     .index("places", "place", &Document::new("1").with_field("name", "Oslo"))
//!     .await?;
//! client.refresh("places").await?;
//!
//! let request = SearchRequest::for_query(Query::term("name", "Oslo")?);
//! let result = client.query("places", "place", &request).await?;
//! println!("{} hits", result.total());
//! # Ok(())
//! # }
//! ```

mod bulk;
pub mod client;
pub mod config;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod response;
pub mod telemetry;
pub mod transport;

pub use esbridge_dsl as dsl;

pub use client::EsClient;
pub use config::{ClientConfig, EndpointConfig, HttpConfig, LogFormat, LoggingConfig, ScrollConfig};
pub use document::Document;
pub use endpoint::{Endpoint, EndpointResolver, RoundRobinEndpoints, StaticEndpoint};
pub use error::{Error, Result};
pub use reqwest::Method;
pub use response::{
    Bucket, BucketAggregationResult, BucketList, BulkItemError, BulkItemOutcome, BulkResult,
    DeleteByQueryResult, FromSource, GetResult, Hit, IndexResult, QueryResult, ScrollCursor,
    ScrollPage, SuggestOption, SuggestResult, TotalHits,
};
