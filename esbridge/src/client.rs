//! Async client facade: one method per engine operation

use crate::bulk::{self, explicit_type};
use crate::config::{ClientConfig, HttpConfig};
use crate::document::Document;
use crate::endpoint::{resolver_from_config, Endpoint, EndpointResolver, StaticEndpoint};
use crate::error::{Error, Result};
use crate::response::{
    BucketAggregationResult, BulkResult, CountResponse, DeleteByQueryResult, GetResult, Hit,
    IndexResult, QueryResult, ScrollCursor, ScrollPage, SuggestResult,
};
use crate::transport::{RawResponse, RequestBody, Transport};
use async_stream::try_stream;
use esbridge_dsl::{CompletionSuggestion, DslError, IndexSettings, SearchRequest, TypeMapping};
use futures::Stream;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_KEEP_ALIVE: &str = "1m";

#[derive(Serialize)]
struct CreateIndexBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a IndexSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mappings: Option<Value>,
}

/// Client for one Elasticsearch-compatible engine (or a rotating set of nodes).
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct EsClient {
    transport: Transport,
    keep_alive: String,
}

impl EsClient {
    /// Client for a single endpoint with default HTTP settings
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        Self::with_resolver(
            Arc::new(StaticEndpoint::new(endpoint)),
            &HttpConfig::default(),
        )
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let resolver = resolver_from_config(&config.endpoint)?;
        let mut client = Self::with_resolver(resolver, &config.http)?;
        client.keep_alive = config.scroll.keep_alive.clone();
        Ok(client)
    }

    pub fn with_resolver(resolver: Arc<dyn EndpointResolver>, http: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(http.connect_timeout());
        if let Some(timeout) = http.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            transport: Transport::new(builder.build()?, resolver),
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        })
    }

    /// Default scroll keep-alive
    pub fn keep_alive(&self) -> &str {
        &self.keep_alive
    }

    // ========================================================================
    // Index administration
    // ========================================================================

    /// Create `index` with optional settings and one type mapping.
    ///
    /// Fails with [`Error::IndexAlreadyExists`] if the index is already there.
    pub async fn create_index(
        &self,
        index: &str,
        settings: Option<&IndexSettings>,
        mapping: Option<(&str, &TypeMapping)>,
    ) -> Result<()> {
        let mappings = match mapping {
            Some((doc_type, mapping)) => {
                let mapping = serde_json::to_value(mapping)?;
                Some(match explicit_type(doc_type) {
                    Some(t) => json!({ t: mapping }),
                    None => mapping,
                })
            }
            None => None,
        };
        let body = serde_json::to_value(CreateIndexBody { settings, mappings })?;

        let response = self
            .transport
            .send(Method::PUT, &[index], &[], Some(RequestBody::Json(body)))
            .await?;
        match response.error_for_status() {
            Ok(_) => {
                info!(index, "Created index");
                Ok(())
            }
            Err(e) if e.is_index_already_exists() => Err(Error::IndexAlreadyExists(index.to_string())),
            Err(e) => Err(e),
        }
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.transport.send(Method::HEAD, &[index], &[], None).await?;
        match response.status {
            404 => Ok(false),
            _ => response.error_for_status().map(|_| true),
        }
    }

    /// Add or extend the mapping of `doc_type` in an existing index
    pub async fn put_mapping(&self, index: &str, doc_type: &str, mapping: &TypeMapping) -> Result<()> {
        let body = RequestBody::Json(serde_json::to_value(mapping)?);
        let segments: Vec<&str> = match explicit_type(doc_type) {
            Some(t) => vec![index, "_mapping", t],
            None => vec![index, "_mapping"],
        };
        self.transport
            .send(Method::PUT, &segments, &[], Some(body))
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Make recent writes visible to search
    pub async fn refresh(&self, index: &str) -> Result<()> {
        self.transport
            .send(Method::POST, &[index, "_refresh"], &[], None)
            .await?
            .error_for_status()?;
        Ok(())
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Index one document, overwriting any previous version with that id
    pub async fn index(&self, index: &str, doc_type: &str, doc: &Document) -> Result<IndexResult> {
        doc.validate()?;
        let body = RequestBody::Json(Value::Object(doc.fields().clone()));
        let response = self
            .transport
            .send(
                Method::PUT,
                &[index, doc_type_or_default(doc_type), doc.id()],
                &[],
                Some(body),
            )
            .await?
            .error_for_status()?;
        IndexResult::from_body(response.status, &response.body)
    }

    /// `None` if no document has that id
    pub async fn get_document(&self, index: &str, doc_type: &str, id: &str) -> Result<Option<GetResult>> {
        let response = self
            .transport
            .send(Method::GET, &[index, doc_type_or_default(doc_type), id], &[], None)
            .await?;
        if response.status == 404 {
            // a missing index is also a 404, but with an error body
            if let Ok(None) = GetResult::from_body(&response.body) {
                return Ok(None);
            }
        }
        let response = response.error_for_status()?;
        GetResult::from_body(&response.body)
    }

    pub async fn bulk_index(&self, index: &str, doc_type: &str, docs: &[Document]) -> Result<BulkResult> {
        if docs.is_empty() {
            return Ok(BulkResult::default());
        }
        let body = bulk::encode_index(index, doc_type, docs)?;
        self.send_bulk(body, docs.len()).await
    }

    /// Partial updates; missing documents are created from the given fields
    pub async fn bulk_update(&self, index: &str, doc_type: &str, docs: &[Document]) -> Result<BulkResult> {
        if docs.is_empty() {
            return Ok(BulkResult::default());
        }
        let body = bulk::encode_update(index, doc_type, docs)?;
        self.send_bulk(body, docs.len()).await
    }

    async fn send_bulk(&self, body: String, expected: usize) -> Result<BulkResult> {
        let response = self
            .transport
            .send(Method::POST, &["_bulk"], &[], Some(RequestBody::Ndjson(body)))
            .await?
            .error_for_status()?;
        let result = BulkResult::from_body(&response.body, expected)?;
        if result.errors {
            debug!(
                failed = result.failed().count(),
                total = result.len(),
                "Bulk request had item failures"
            );
        }
        Ok(result)
    }

    /// Delete every document matching the request's query
    pub async fn delete_document(
        &self,
        index: &str,
        doc_type: &str,
        request: &SearchRequest,
    ) -> Result<DeleteByQueryResult> {
        let response = self
            .post_json(
                &search_path(index, doc_type, "_delete_by_query"),
                &[],
                request.query_body(),
            )
            .await?;
        response.json()
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub async fn query(&self, index: &str, doc_type: &str, request: &SearchRequest) -> Result<QueryResult> {
        let body = serde_json::to_value(request)?;
        let response = self
            .post_json(&search_path(index, doc_type, "_search"), &[], body)
            .await?;
        QueryResult::from_value(response.json()?)
    }

    /// Number of documents matching the request's query
    pub async fn count(&self, index: &str, doc_type: &str, request: &SearchRequest) -> Result<u64> {
        let response = self
            .post_json(&search_path(index, doc_type, "_count"), &[], request.query_body())
            .await?;
        let count: CountResponse = response.json()?;
        Ok(count.count)
    }

    /// Buckets of every bucketing aggregation in the request.
    ///
    /// Hits are not fetched unless the request sets a size.
    pub async fn bucket_aggregation(
        &self,
        index: &str,
        doc_type: &str,
        request: &SearchRequest,
    ) -> Result<BucketAggregationResult> {
        let names: Vec<&str> = request
            .aggregations()
            .iter()
            .filter(|(_, agg)| agg.is_bucketing())
            .map(|(name, _)| name.as_str())
            .collect();
        if names.is_empty() {
            return Err(Error::Dsl(DslError::InvalidAggregation(
                "request has no bucketing aggregation".to_string(),
            )));
        }

        let request = match request.size() {
            Some(_) => request.clone(),
            None => request.clone().with_size(0),
        };
        let response = self
            .post_json(
                &search_path(index, doc_type, "_search"),
                &[],
                serde_json::to_value(&request)?,
            )
            .await?;
        BucketAggregationResult::from_value(&response.json()?, names)
    }

    /// Completion suggestions for one prefix
    pub async fn suggest(
        &self,
        index: &str,
        doc_type: &str,
        suggestion: &CompletionSuggestion,
    ) -> Result<SuggestResult> {
        let request = SearchRequest::new()
            .with_size(0)
            .with_suggestion(suggestion.clone());
        let response = self
            .post_json(
                &search_path(index, doc_type, "_search"),
                &[],
                serde_json::to_value(&request)?,
            )
            .await?;
        SuggestResult::from_body(&response.body, suggestion.name())
    }

    // ========================================================================
    // Scroll
    // ========================================================================

    /// Run a search that keeps a cursor open for `keep_alive`
    /// (the configured default when `None`)
    pub async fn start_scroll(
        &self,
        index: &str,
        doc_type: &str,
        request: &SearchRequest,
        keep_alive: Option<&str>,
    ) -> Result<ScrollPage> {
        let keep_alive = keep_alive.unwrap_or(&self.keep_alive);
        let response = self
            .post_json(
                &search_path(index, doc_type, "_search"),
                &[("scroll", keep_alive)],
                serde_json::to_value(request)?,
            )
            .await?;
        ScrollPage::from_value(response.json()?, keep_alive)
    }

    /// Next page; an empty page means the scroll is exhausted
    pub async fn scroll(&self, cursor: &ScrollCursor) -> Result<ScrollPage> {
        let body = json!({ "scroll": cursor.keep_alive, "scroll_id": cursor.id });
        let response = self
            .post_json(&["_search", "scroll"], &[], body)
            .await?;
        ScrollPage::from_value(response.json()?, &cursor.keep_alive)
    }

    /// Release the server-side cursor. Clearing an expired cursor succeeds.
    pub async fn clear_scroll(&self, cursor: &ScrollCursor) -> Result<()> {
        let body = RequestBody::Json(json!({ "scroll_id": [cursor.id] }));
        let response = self
            .transport
            .send(Method::DELETE, &["_search", "scroll"], &[], Some(body))
            .await?;
        if response.status != 404 {
            response.error_for_status()?;
        }
        Ok(())
    }

    /// Every hit of a search, page by page. The cursor is cleared once the
    /// last page has been read.
    pub fn scroll_stream<'a>(
        &'a self,
        index: &'a str,
        doc_type: &'a str,
        request: &'a SearchRequest,
        keep_alive: Option<&'a str>,
    ) -> Pin<Box<dyn Stream<Item = Result<Hit>> + Send + 'a>> {
        Box::pin(try_stream! {
            let mut page = self.start_scroll(index, doc_type, request, keep_alive).await?;
            while !page.is_exhausted() {
                let cursor = page.cursor.clone();
                for hit in page.result.into_hits() {
                    yield hit;
                }
                page = self.scroll(&cursor).await?;
            }
            self.clear_scroll(&page.cursor).await?;
        })
    }

    // ========================================================================
    // Escape hatch
    // ========================================================================

    /// Send any request; returns the body of a 2xx response
    pub async fn raw_request(&self, method: Method, path: &str, body: Option<Value>) -> Result<String> {
        let response = self
            .transport
            .send_path(method, path, body.map(RequestBody::Json))
            .await?
            .error_for_status()?;
        Ok(response.body)
    }

    async fn post_json(&self, segments: &[&str], query: &[(&str, &str)], body: Value) -> Result<RawResponse> {
        self.transport
            .send(Method::POST, segments, query, Some(RequestBody::Json(body)))
            .await?
            .error_for_status()
    }
}

fn doc_type_or_default(doc_type: &str) -> &str {
    if doc_type.is_empty() {
        "_doc"
    } else {
        doc_type
    }
}

/// `/{index}/{type}/{endpoint}`, without the type for typeless engines
fn search_path<'a>(index: &'a str, doc_type: &'a str, endpoint: &'a str) -> Vec<&'a str> {
    match explicit_type(doc_type) {
        Some(t) => vec![index, t, endpoint],
        None => vec![index, endpoint],
    }
}
