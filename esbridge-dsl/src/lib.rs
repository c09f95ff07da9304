//! Typed Elasticsearch request DSL
//!
//! Value types for everything a client sends to the engine, each serializing
//! to the engine's JSON wire shape through `serde`:
//!
//! - index settings and analysis components (`settings`)
//! - per-type field mappings (`mapping`)
//! - queries, filters and the root search request (`query`)
//! - sort clauses (`sort`)
//! - aggregations (`aggregation`)
//! - completion suggestions (`suggest`)
//!
//! Invalid combinations are rejected by the constructors with a [`DslError`].
//! All internal maps are ordered, so the same value always serializes to the
//! same bytes.

pub mod aggregation;
pub mod error;
pub mod mapping;
pub mod query;
pub mod settings;
pub mod sort;
pub mod suggest;

pub use aggregation::{Aggregation, AggregationKind, BucketOrder, ExecutionHint, TermsAggregation};
pub use error::{DslError, Result};
pub use mapping::{FieldMapping, FieldType, IndexOption, TypeMapping};
pub use query::{
    BoolQuery, Distance, DistanceUnit, Filter, GeoPoint, MatchParams, Operator, Query,
    RangeBounds, SearchRequest, SourceFilter,
};
pub use settings::{Analysis, Analyzer, IndexSettings, TokenChars, TokenFilter, Tokenizer};
pub use sort::{FieldSort, GeoSort, Missing, Sort, SortMode, SortOrder};
pub use suggest::{CompletionSuggestion, Fuzziness};
