//! Elasticsearch Query DSL types
//!
//! `Query` and `Filter` are closed sum types. Leaf clauses serialize as the
//! engine's `{"kind": {"field": params}}` shape, compound clauses nest
//! sub-trees to any depth.

use crate::error::{field_name, DslError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A single-entry `{field: params}` object.
///
/// Only built by the validating `Query`/`Filter` constructors:
///
/// ```compile_fail
/// use esbridge_dsl::query::FieldClause;
/// use esbridge_dsl::{Query, RangeBounds};
///
/// let bounds = RangeBounds::new().gt(1).gte(2);
/// let _ = Query::Range(FieldClause { field: String::new(), params: bounds });
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldClause<T> {
    field: String,
    params: T,
}

impl<T> FieldClause<T> {
    fn new(field: impl Into<String>, params: T) -> Result<Self> {
        Ok(Self {
            field: field_name(field)?,
            params,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn params(&self) -> &T {
        &self.params
    }
}

impl<T: Serialize> Serialize for FieldClause<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.params)?;
        map.end()
    }
}

/// ES Query types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Match all documents
    MatchAll(MatchAllQuery),

    /// Term query (exact match, not analyzed)
    Term(FieldClause<TermParams>),

    /// Terms query (any of several exact values)
    Terms(FieldClause<Vec<Value>>),

    /// Match query (analyzed full-text)
    Match(FieldClause<MatchParams>),

    /// Match phrase query
    MatchPhrase(FieldClause<MatchPhraseParams>),

    /// Phrase query whose last term is a prefix
    MatchPhrasePrefix(FieldClause<MatchPhrasePrefixParams>),

    /// Prefix query
    Prefix(FieldClause<ValueParams>),

    /// Wildcard query (`*` and `?`)
    Wildcard(FieldClause<ValueParams>),

    /// Regular expression query
    Regexp(FieldClause<RegexpParams>),

    /// Range query
    Range(FieldClause<RangeBounds>),

    /// IDs query
    Ids(IdsQuery),

    /// Exists query
    Exists(ExistsQuery),

    /// Bool query (must, should, must_not, filter)
    Bool(BoolQuery),

    /// Geo distance query
    GeoDistance(GeoDistance),
}

impl Query {
    pub fn match_all() -> Self {
        Query::MatchAll(MatchAllQuery::default())
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        Ok(Query::Term(FieldClause::new(
            field,
            TermParams {
                value: value.into(),
                boost: None,
            },
        )?))
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let field = field_name(field)?;
        let values = non_empty_values(&field, values)?;
        Ok(Query::Terms(FieldClause { field, params: values }))
    }

    pub fn match_query(field: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::match_with(field, MatchParams::new(text))
    }

    pub fn match_with(field: impl Into<String>, params: MatchParams) -> Result<Self> {
        Ok(Query::Match(FieldClause::new(field, params)?))
    }

    pub fn match_phrase(field: impl Into<String>, phrase: impl Into<String>) -> Result<Self> {
        Ok(Query::MatchPhrase(FieldClause::new(
            field,
            MatchPhraseParams {
                query: phrase.into(),
                slop: None,
                analyzer: None,
            },
        )?))
    }

    pub fn match_phrase_prefix(
        field: impl Into<String>,
        phrase: impl Into<String>,
        max_expansions: Option<u32>,
    ) -> Result<Self> {
        Ok(Query::MatchPhrasePrefix(FieldClause::new(
            field,
            MatchPhrasePrefixParams {
                query: phrase.into(),
                max_expansions,
                slop: None,
            },
        )?))
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        Ok(Query::Prefix(FieldClause::new(field, ValueParams::new(prefix))?))
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Ok(Query::Wildcard(FieldClause::new(field, ValueParams::new(pattern))?))
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Ok(Query::Regexp(FieldClause::new(
            field,
            RegexpParams {
                value: pattern.into(),
                flags: None,
            },
        )?))
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Result<Self> {
        let field = field_name(field)?;
        bounds.validate(&field)?;
        Ok(Query::Range(FieldClause { field, params: bounds }))
    }

    /// Closed interval `[from, to]`
    pub fn between(
        field: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Result<Self> {
        Self::range(field, RangeBounds::new().gte(from).lte(to))
    }

    pub fn ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = ids.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(DslError::EmptyValues("_id".to_string()));
        }
        Ok(Query::Ids(IdsQuery { values }))
    }

    pub fn exists(field: impl Into<String>) -> Result<Self> {
        Ok(Query::Exists(ExistsQuery {
            field: field_name(field)?,
        }))
    }

    pub fn geo_distance(
        field: impl Into<String>,
        point: GeoPoint,
        distance: Distance,
    ) -> Result<Self> {
        Ok(Query::GeoDistance(GeoDistance::new(field, point, distance)?))
    }

    /// A query restricted by filters that do not contribute to scoring.
    ///
    /// Serialized as `bool` with the query under `must` and the filters
    /// under `filter`.
    pub fn filtered(query: Query, filters: impl IntoIterator<Item = Filter>) -> Self {
        Query::Bool(BoolQuery::new().must(query).filters(filters))
    }
}

impl From<BoolQuery> for Query {
    fn from(b: BoolQuery) -> Self {
        Query::Bool(b)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAllQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermParams {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchParams {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

impl MatchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operator: None,
            analyzer: None,
            fuzziness: None,
            boost: None,
        }
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzziness.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPhraseParams {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slop: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPhrasePrefixParams {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_expansions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slop: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueParams {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

impl ValueParams {
    fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            boost: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegexpParams {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
}

/// Bounds of a range clause, built with chained setters and checked when
/// the clause is constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

impl RangeBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    fn validate(&self, field: &str) -> Result<()> {
        let invalid = |reason: &str| DslError::InvalidRange {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none() {
            return Err(invalid("no bounds given"));
        }
        if self.gt.is_some() && self.gte.is_some() {
            return Err(invalid("both gt and gte given"));
        }
        if self.lt.is_some() && self.lte.is_some() {
            return Err(invalid("both lt and lte given"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdsQuery {
    values: Vec<String>,
}

impl IdsQuery {
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistsQuery {
    field: String,
}

impl ExistsQuery {
    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Bool query; clauses are appended by value so composing never touches a
/// shared tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filter.extend(filters);
        self
    }

    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.must_not.is_empty()
            && self.filter.is_empty()
    }
}

/// Filter-context clauses. They match or don't, without scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Term(FieldClause<Value>),
    Terms(FieldClause<Vec<Value>>),
    Range(FieldClause<RangeBounds>),
    Exists(ExistsQuery),
    GeoDistance(GeoDistance),
    Bool(Box<BoolQuery>),
    /// Any query used in filter context serializes as the query itself
    #[serde(untagged)]
    Query(Box<Query>),
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        Ok(Filter::Term(FieldClause::new(field, value.into())?))
    }

    /// Multi-term filter: matches when the field holds any of `values`
    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let field = field_name(field)?;
        let values = non_empty_values(&field, values)?;
        Ok(Filter::Terms(FieldClause { field, params: values }))
    }

    pub fn range(field: impl Into<String>, bounds: RangeBounds) -> Result<Self> {
        let field = field_name(field)?;
        bounds.validate(&field)?;
        Ok(Filter::Range(FieldClause { field, params: bounds }))
    }

    pub fn exists(field: impl Into<String>) -> Result<Self> {
        Ok(Filter::Exists(ExistsQuery {
            field: field_name(field)?,
        }))
    }

    pub fn geo_distance(
        field: impl Into<String>,
        point: GeoPoint,
        distance: Distance,
    ) -> Result<Self> {
        Ok(Filter::GeoDistance(GeoDistance::new(field, point, distance)?))
    }

    pub fn bool(query: BoolQuery) -> Self {
        Filter::Bool(Box::new(query))
    }

    pub fn query(query: Query) -> Self {
        Filter::Query(Box::new(query))
    }
}

fn non_empty_values<I, V>(field: &str, values: I) -> Result<Vec<Value>>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Err(DslError::EmptyValues(field.to_string()));
    }
    Ok(values)
}

/// Latitude/longitude pair, range-checked by [`GeoPoint::new`]
///
/// ```compile_fail
/// let _ = esbridge_dsl::GeoPoint { lat: 500.0, lon: f64::NAN };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DslError::InvalidGeo(format!("latitude {} out of range", lat)));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(DslError::InvalidGeo(format!("longitude {} out of range", lon)));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DistanceUnit {
    #[serde(rename = "mm")]
    Millimeters,
    #[serde(rename = "cm")]
    Centimeters,
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "in")]
    Inches,
    #[serde(rename = "ft")]
    Feet,
    #[serde(rename = "yd")]
    Yards,
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "nmi")]
    NauticalMiles,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Millimeters => "mm",
            Self::Centimeters => "cm",
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::Inches => "in",
            Self::Feet => "ft",
            Self::Yards => "yd",
            Self::Miles => "mi",
            Self::NauticalMiles => "nmi",
        }
    }
}

/// A positive distance such as `12km`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    value: f64,
    unit: DistanceUnit,
}

impl Distance {
    pub fn new(value: f64, unit: DistanceUnit) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DslError::InvalidGeo(format!(
                "distance must be positive, got {}",
                value
            )));
        }
        Ok(Self { value, unit })
    }

    pub fn km(value: f64) -> Result<Self> {
        Self::new(value, DistanceUnit::Kilometers)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

impl Serialize for Distance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Documents within `distance` of `point` on a `geo_point` field
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDistance {
    field: String,
    point: GeoPoint,
    distance: Distance,
}

impl GeoDistance {
    pub fn new(field: impl Into<String>, point: GeoPoint, distance: Distance) -> Result<Self> {
        Ok(Self {
            field: field_name(field)?,
            point,
            distance,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn point(&self) -> GeoPoint {
        self.point
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }
}

impl Serialize for GeoDistance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("distance", &self.distance)?;
        map.serialize_entry(&self.field, &self.point)?;
        map.end()
    }
}
