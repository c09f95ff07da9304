//! Typed views of engine responses

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;

// ============================================================================
// Search
// ============================================================================

/// `hits.total`: a bare number before 7.x, `{value, relation}` after
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Object { value, .. } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
    #[serde(default)]
    pub sort: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    max_score: Option<f64>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    #[serde(default)]
    hits: HitsEnvelope,
}

/// Decodes a hit's `_source` into a caller type
pub trait FromSource: Sized {
    type Error: Display;

    fn from_source(source: &Map<String, Value>) -> std::result::Result<Self, Self::Error>;
}

/// Result of a search: typed hits plus the raw response
#[derive(Debug, Clone)]
pub struct QueryResult {
    raw: Value,
    took: u64,
    timed_out: bool,
    total: u64,
    max_score: Option<f64>,
    hits: Vec<Hit>,
}

impl QueryResult {
    pub(crate) fn from_value(raw: Value) -> Result<Self> {
        let (result, _) = Self::with_scroll_id(raw)?;
        Ok(result)
    }

    fn with_scroll_id(raw: Value) -> Result<(Self, Option<String>)> {
        let envelope = SearchEnvelope::deserialize(&raw)?;
        let hits = envelope.hits;
        let total = hits
            .total
            .map(|t| t.value())
            .unwrap_or(hits.hits.len() as u64);
        let result = Self {
            raw,
            took: envelope.took,
            timed_out: envelope.timed_out,
            total,
            max_score: hits.max_score,
            hits: hits.hits,
        };
        Ok((result, envelope.scroll_id))
    }

    /// The response exactly as the engine sent it
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn took(&self) -> u64 {
        self.took
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Total matches, not just those on this page
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<Hit> {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }

    pub fn sources(&self) -> Vec<&Map<String, Value>> {
        self.hits.iter().map(|h| &h.source).collect()
    }

    pub fn extract<T: FromSource>(&self) -> Result<Vec<T>> {
        self.extract_with(T::from_source)
    }

    /// Decode every hit with `decode`; the first failure aborts
    pub fn extract_with<T, E, F>(&self, decode: F) -> Result<Vec<T>>
    where
        E: Display,
        F: Fn(&Map<String, Value>) -> std::result::Result<T, E>,
    {
        self.hits
            .iter()
            .map(|hit| {
                decode(&hit.source).map_err(|e| Error::Decode {
                    id: hit.id.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    pub fn extract_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.extract_with(|source| serde_json::from_value::<T>(Value::Object(source.clone())))
    }
}

// ============================================================================
// Scroll
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollCursor {
    pub id: String,
    pub keep_alive: String,
}

/// One page of a scroll plus the cursor for the next one
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub cursor: ScrollCursor,
    pub result: QueryResult,
}

impl ScrollPage {
    pub(crate) fn from_value(raw: Value, keep_alive: &str) -> Result<Self> {
        let (result, scroll_id) = QueryResult::with_scroll_id(raw)?;
        let id = scroll_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::UnexpectedResponse("scroll response without _scroll_id".to_string()))?;
        Ok(Self {
            cursor: ScrollCursor {
                id,
                keep_alive: keep_alive.to_string(),
            },
            result,
        })
    }

    /// No hits left; the cursor can be cleared
    pub fn is_exhausted(&self) -> bool {
        self.result.is_empty()
    }
}

// ============================================================================
// Single-document writes and reads
// ============================================================================

#[derive(Debug, Deserialize)]
struct WriteEnvelope {
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_version", default)]
    version: Option<u64>,
    /// 5.x+: "created" / "updated" / "noop"
    #[serde(default)]
    result: Option<String>,
    /// pre-5.x flag
    #[serde(default)]
    created: Option<bool>,
}

impl WriteEnvelope {
    fn is_created(&self, status: u16) -> bool {
        match (&self.result, self.created) {
            (Some(result), _) => result == "created",
            (None, Some(created)) => created,
            (None, None) => status == 201,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResult {
    pub index: String,
    pub id: String,
    pub version: Option<u64>,
    pub created: bool,
    /// The id was present before and has been overwritten
    pub already_exists: bool,
}

impl IndexResult {
    pub(crate) fn from_body(status: u16, body: &str) -> Result<Self> {
        let envelope: WriteEnvelope = serde_json::from_str(body)?;
        let created = envelope.is_created(status);
        Ok(Self {
            index: envelope.index,
            id: envelope.id,
            version: envelope.version,
            created,
            already_exists: !created,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GetEnvelope {
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_type", default)]
    doc_type: Option<String>,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version", default)]
    version: Option<u64>,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetResult {
    pub index: String,
    pub doc_type: Option<String>,
    pub id: String,
    pub version: Option<u64>,
    pub source: Map<String, Value>,
}

impl GetResult {
    /// `None` when the engine reports `found: false`
    pub(crate) fn from_body(body: &str) -> Result<Option<Self>> {
        let envelope: GetEnvelope = serde_json::from_str(body)?;
        if !envelope.found {
            return Ok(None);
        }
        Ok(Some(Self {
            index: envelope.index,
            doc_type: envelope.doc_type,
            id: envelope.id,
            version: envelope.version,
            source: envelope.source,
        }))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.source.clone())).map_err(|e| Error::Decode {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// Bulk
// ============================================================================

#[derive(Debug, Deserialize)]
struct BulkEnvelope {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItemEnvelope>,
}

/// Each item is keyed by its action name
#[derive(Debug, Deserialize)]
struct BulkItemEnvelope {
    #[serde(default)]
    index: Option<BulkItemBody>,
    #[serde(default)]
    create: Option<BulkItemBody>,
    #[serde(default)]
    update: Option<BulkItemBody>,
    #[serde(default)]
    delete: Option<BulkItemBody>,
}

impl BulkItemEnvelope {
    fn into_body(self) -> Option<BulkItemBody> {
        self.index.or(self.create).or(self.update).or(self.delete)
    }
}

#[derive(Debug, Deserialize)]
struct BulkItemBody {
    #[serde(flatten)]
    write: WriteEnvelope,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    pub error_type: String,
    pub reason: String,
}

impl BulkItemError {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(reason) => Self {
                error_type: reason.split('[').next().unwrap_or_default().to_string(),
                reason,
            },
            other => Self {
                error_type: other["type"].as_str().unwrap_or("unknown").to_string(),
                reason: other["reason"].as_str().unwrap_or_default().to_string(),
            },
        }
    }
}

/// Outcome of one bulk action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemOutcome {
    pub id: String,
    pub status: u16,
    pub version: Option<u64>,
    pub created: bool,
    pub already_exists: bool,
    pub error: Option<BulkItemError>,
}

impl BulkItemOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item outcomes in request order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    pub took: u64,
    /// At least one item failed
    pub errors: bool,
    pub items: Vec<BulkItemOutcome>,
}

impl BulkResult {
    pub(crate) fn from_body(body: &str, expected: usize) -> Result<Self> {
        let envelope: BulkEnvelope = serde_json::from_str(body)?;
        if envelope.items.len() != expected {
            return Err(Error::UnexpectedResponse(format!(
                "bulk response has {} items for {} actions",
                envelope.items.len(),
                expected
            )));
        }

        let items = envelope
            .items
            .into_iter()
            .map(|item| {
                let body = item.into_body().ok_or_else(|| {
                    Error::UnexpectedResponse("bulk item without an action key".to_string())
                })?;
                let error = body.error.map(BulkItemError::from_value);
                let created = error.is_none() && body.write.is_created(body.status);
                Ok(BulkItemOutcome {
                    already_exists: error.is_none() && !created,
                    created,
                    status: body.status,
                    version: body.write.version,
                    id: body.write.id,
                    error,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            took: envelope.took,
            errors: envelope.errors || items.iter().any(|i| !i.is_ok()),
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = &BulkItemOutcome> {
        self.items.iter().filter(|i| !i.is_ok())
    }
}

// ============================================================================
// Count and delete-by-query
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeleteByQueryResult {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub batches: u64,
    #[serde(default)]
    pub version_conflicts: u64,
    #[serde(default)]
    pub noops: u64,
    #[serde(default)]
    pub failures: Vec<Value>,
}

// ============================================================================
// Aggregations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bucket {
    pub key: Value,
    #[serde(default)]
    pub key_as_string: Option<String>,
    pub doc_count: u64,
    /// Sub-aggregation results, by name
    #[serde(flatten)]
    pub aggregations: Map<String, Value>,
}

impl Bucket {
    /// The key as text: `key_as_string` if present, else a string key
    pub fn key_str(&self) -> Option<&str> {
        self.key_as_string.as_deref().or_else(|| self.key.as_str())
    }

    pub fn sub_aggregation(&self, name: &str) -> Option<&Value> {
        self.aggregations.get(name)
    }

    /// `value` of a metric sub-aggregation
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.aggregations.get(name)?.get("value")?.as_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BucketList {
    /// `-1` when the engine cannot bound the error, e.g. ascending count order
    #[serde(default)]
    pub doc_count_error_upper_bound: i64,
    #[serde(default)]
    pub sum_other_doc_count: u64,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketAggregationResult {
    pub total_hits: u64,
    pub aggregations: BTreeMap<String, BucketList>,
}

impl BucketAggregationResult {
    /// Parse the named bucketing aggregations out of a search response
    pub(crate) fn from_value<'a>(
        raw: &Value,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let envelope = SearchEnvelope::deserialize(raw)?;
        let total_hits = envelope.hits.total.map(|t| t.value()).unwrap_or(0);

        let mut aggregations = BTreeMap::new();
        for name in names {
            let agg = raw
                .get("aggregations")
                .and_then(|aggs| aggs.get(name))
                .ok_or_else(|| {
                    Error::UnexpectedResponse(format!("aggregation '{}' missing from response", name))
                })?;
            aggregations.insert(name.to_string(), BucketList::deserialize(agg)?);
        }
        Ok(Self {
            total_hits,
            aggregations,
        })
    }

    pub fn get(&self, name: &str) -> Option<&BucketList> {
        self.aggregations.get(name)
    }

    /// Buckets of the named aggregation, empty if absent
    pub fn buckets(&self, name: &str) -> &[Bucket] {
        self.aggregations
            .get(name)
            .map(|list| list.buckets.as_slice())
            .unwrap_or(&[])
    }

    /// First aggregation by name
    pub fn first(&self) -> Option<(&str, &BucketList)> {
        self.aggregations
            .iter()
            .next()
            .map(|(name, list)| (name.as_str(), list))
    }
}

// ============================================================================
// Suggestions
// ============================================================================

#[derive(Debug, Deserialize)]
struct SuggestEnvelope {
    #[serde(default)]
    suggest: BTreeMap<String, Vec<SuggestEntry>>,
}

#[derive(Debug, Deserialize)]
struct SuggestEntry {
    #[serde(default)]
    options: Vec<SuggestOption>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestOption {
    pub text: String,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", alias = "score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Map<String, Value>>,
}

/// Completion options in engine order
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestResult {
    pub name: String,
    pub options: Vec<SuggestOption>,
}

impl SuggestResult {
    pub(crate) fn from_body(body: &str, name: &str) -> Result<Self> {
        let envelope: SuggestEnvelope = serde_json::from_str(body)?;
        let entries = envelope.suggest.into_iter().find(|(n, _)| n == name);
        let options = match entries {
            Some((_, entries)) => entries.into_iter().flat_map(|e| e.options).collect(),
            None => {
                return Err(Error::UnexpectedResponse(format!(
                    "suggestion '{}' missing from response",
                    name
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            options,
        })
    }

    pub fn texts(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
