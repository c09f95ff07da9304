//! Root search request body

use super::types::Query;
use crate::aggregation::Aggregation;
use crate::error::{DslError, Result};
use crate::sort::Sort;
use crate::suggest::CompletionSuggestion;
use serde::ser::Serializer;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Fields to return in `_source`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceFilter {
    Bool(bool),
    Fields(Vec<String>),
    Object {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        includes: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        excludes: Vec<String>,
    },
}

impl SourceFilter {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceFilter::Fields(fields.into_iter().map(Into::into).collect())
    }
}

/// Root ES search request body
///
/// Built with `with_*` methods; each returns a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<Query>,

    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_timeout"
    )]
    timeout: Option<Duration>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    sort: Vec<Sort>,

    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    source: Option<SourceFilter>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    aggs: BTreeMap<String, Aggregation>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    suggest: BTreeMap<String, CompletionSuggestion>,
}

fn serialize_timeout<S: Serializer>(
    timeout: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match timeout {
        // sub-millisecond remainders round up so a short timeout never becomes "0ms"
        Some(d) => {
            let ms = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
            serializer.collect_str(&format_args!("{}ms", ms))
        }
        None => serializer.serialize_none(),
    }
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_query(query: Query) -> Self {
        Self::new().with_query(query)
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets `from` and `size` together, rejecting a window past `usize::MAX`
    pub fn with_page(self, from: usize, size: usize) -> Result<Self> {
        if from.checked_add(size).is_none() {
            return Err(DslError::InvalidPagination(format!(
                "from {} + size {} overflows",
                from, size
            )));
        }
        Ok(self.with_from(from).with_size(size))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_source(mut self, source: SourceFilter) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_aggregation(mut self, name: impl Into<String>, aggregation: Aggregation) -> Self {
        self.aggs.insert(name.into(), aggregation);
        self
    }

    pub fn with_suggestion(mut self, suggestion: CompletionSuggestion) -> Self {
        self.suggest.insert(suggestion.name().to_string(), suggestion);
        self
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn from(&self) -> Option<usize> {
        self.from
    }

    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sort
    }

    pub fn source(&self) -> Option<&SourceFilter> {
        self.source.as_ref()
    }

    pub fn aggregations(&self) -> &BTreeMap<String, Aggregation> {
        &self.aggs
    }

    pub fn suggestions(&self) -> &BTreeMap<String, CompletionSuggestion> {
        &self.suggest
    }

    /// Body for endpoints that accept only a query (`_count`, `_delete_by_query`)
    pub fn query_body(&self) -> Value {
        match &self.query {
            Some(q) => json!({ "query": q }),
            None => json!({}),
        }
    }
}
