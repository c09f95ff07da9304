//! Sort clauses

use crate::error::{field_name, Result};
use crate::query::{DistanceUnit, GeoPoint};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// How multi-valued fields are reduced before sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Min,
    Max,
    Sum,
    Avg,
    Median,
}

/// Placement of documents missing the sort field
#[derive(Debug, Clone, PartialEq)]
pub enum Missing {
    First,
    Last,
    Value(Value),
}

impl Serialize for Missing {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Missing::First => serializer.serialize_str("_first"),
            Missing::Last => serializer.serialize_str("_last"),
            Missing::Value(v) => v.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSort {
    #[serde(skip)]
    field: String,
    order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<Missing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<SortMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unmapped_type: Option<String>,
}

impl FieldSort {
    pub fn missing(mut self, missing: Missing) -> Self {
        self.missing = Some(missing);
        self
    }

    pub fn mode(mut self, mode: SortMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn unmapped_type(mut self, ty: impl Into<String>) -> Self {
        self.unmapped_type = Some(ty.into());
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// A single sort clause.
///
/// The order is a two-valued enum, so one clause can never ask for both
/// directions at once.
#[derive(Debug, Clone, PartialEq)]
pub enum Sort {
    Field(FieldSort),
    Score(SortOrder),
    /// Index order, the cheapest sort for scrolling
    Doc,
    GeoDistance(GeoSort),
}

/// Sort by distance from a point; built with [`Sort::geo_distance`]
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSort {
    field: String,
    point: GeoPoint,
    order: SortOrder,
    unit: DistanceUnit,
}

impl GeoSort {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn point(&self) -> GeoPoint {
        self.point
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }
}

impl Sort {
    pub fn field(field: impl Into<String>, order: SortOrder) -> Result<Self> {
        Ok(Self::Field(Self::field_sort(field, order)?))
    }

    pub fn asc(field: impl Into<String>) -> Result<Self> {
        Self::field(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Result<Self> {
        Self::field(field, SortOrder::Desc)
    }

    /// Field sort with extra options, wrap with `Sort::Field`
    pub fn field_sort(field: impl Into<String>, order: SortOrder) -> Result<FieldSort> {
        Ok(FieldSort {
            field: field_name(field)?,
            order,
            missing: None,
            mode: None,
            unmapped_type: None,
        })
    }

    pub fn score() -> Self {
        Self::Score(SortOrder::Desc)
    }

    pub fn geo_distance(
        field: impl Into<String>,
        point: GeoPoint,
        order: SortOrder,
        unit: DistanceUnit,
    ) -> Result<Self> {
        Ok(Self::GeoDistance(GeoSort {
            field: field_name(field)?,
            point,
            order,
            unit,
        }))
    }
}

#[derive(Serialize)]
struct OrderOnly {
    order: SortOrder,
}

struct GeoSortBody<'a> {
    field: &'a str,
    point: &'a GeoPoint,
    order: SortOrder,
    unit: DistanceUnit,
}

impl Serialize for GeoSortBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.field, self.point)?;
        map.serialize_entry("order", &self.order)?;
        map.serialize_entry("unit", &self.unit)?;
        map.end()
    }
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Sort::Doc => serializer.serialize_str("_doc"),
            Sort::Field(f) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&f.field, f)?;
                map.end()
            }
            Sort::Score(order) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("_score", &OrderOnly { order: *order })?;
                map.end()
            }
            Sort::GeoDistance(geo) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(
                    "_geo_distance",
                    &GeoSortBody {
                        field: &geo.field,
                        point: &geo.point,
                        order: geo.order,
                        unit: geo.unit,
                    },
                )?;
                map.end()
            }
        }
    }
}
