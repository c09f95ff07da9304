//! Aggregation types

use crate::error::{field_name, DslError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionHint {
    Map,
    GlobalOrdinals,
}

/// Bucket ordering for a terms aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOrder {
    CountDesc,
    CountAsc,
    KeyAsc,
    KeyDesc,
}

impl Serialize for BucketOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (key, dir) = match self {
            BucketOrder::CountDesc => ("_count", "desc"),
            BucketOrder::CountAsc => ("_count", "asc"),
            BucketOrder::KeyAsc => ("_key", "asc"),
            BucketOrder::KeyDesc => ("_key", "desc"),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key, dir)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermsAggregation {
    field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shard_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_doc_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_hint: Option<ExecutionHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<BucketOrder>,
}

impl TermsAggregation {
    pub fn new(field: impl Into<String>) -> Result<Self> {
        Ok(Self {
            field: field_name(field)?,
            size: None,
            shard_size: None,
            include: None,
            exclude: None,
            min_doc_count: None,
            execution_hint: None,
            order: None,
        })
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn shard_size(mut self, shard_size: u32) -> Self {
        self.shard_size = Some(shard_size);
        self
    }

    /// Regex pattern restricting which terms become buckets
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include = Some(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude = Some(pattern.into());
        self
    }

    pub fn min_doc_count(mut self, count: u64) -> Self {
        self.min_doc_count = Some(count);
        self
    }

    pub fn execution_hint(mut self, hint: ExecutionHint) -> Self {
        self.execution_hint = Some(hint);
        self
    }

    pub fn order(mut self, order: BucketOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn validate(&self) -> Result<()> {
        if self.size == Some(0) {
            return Err(DslError::InvalidAggregation(format!(
                "terms on '{}': size must be positive",
                self.field
            )));
        }
        if let (Some(size), Some(shard_size)) = (self.size, self.shard_size) {
            if shard_size < size {
                return Err(DslError::InvalidAggregation(format!(
                    "terms on '{}': shard_size {} is smaller than size {}",
                    self.field, shard_size, size
                )));
            }
        }
        Ok(())
    }
}

/// Single-value metric over a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAggregation {
    field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Terms(TermsAggregation),
    Avg(MetricAggregation),
    Sum(MetricAggregation),
    Min(MetricAggregation),
    Max(MetricAggregation),
    ValueCount(MetricAggregation),
    Cardinality(MetricAggregation),
}

/// A named aggregation with optional named sub-aggregations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    #[serde(flatten)]
    kind: AggregationKind,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    aggs: BTreeMap<String, Aggregation>,
}

impl Aggregation {
    pub fn terms(terms: TermsAggregation) -> Result<Self> {
        terms.validate()?;
        Ok(Self::from_kind(AggregationKind::Terms(terms)))
    }

    pub fn avg(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::Avg(metric(field)?)))
    }

    pub fn sum(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::Sum(metric(field)?)))
    }

    pub fn min(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::Min(metric(field)?)))
    }

    pub fn max(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::Max(metric(field)?)))
    }

    pub fn value_count(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::ValueCount(metric(field)?)))
    }

    pub fn cardinality(field: impl Into<String>) -> Result<Self> {
        Ok(Self::from_kind(AggregationKind::Cardinality(metric(field)?)))
    }

    fn from_kind(kind: AggregationKind) -> Self {
        Self {
            kind,
            aggs: BTreeMap::new(),
        }
    }

    pub fn with_sub_aggregation(mut self, name: impl Into<String>, sub: Aggregation) -> Self {
        self.aggs.insert(name.into(), sub);
        self
    }

    pub fn kind(&self) -> &AggregationKind {
        &self.kind
    }

    pub fn sub_aggregations(&self) -> &BTreeMap<String, Aggregation> {
        &self.aggs
    }

    /// Whether the engine answers this aggregation with a bucket list
    pub fn is_bucketing(&self) -> bool {
        matches!(self.kind, AggregationKind::Terms(_))
    }
}

fn metric(field: impl Into<String>) -> Result<MetricAggregation> {
    Ok(MetricAggregation {
        field: field_name(field)?,
        missing: None,
    })
}
