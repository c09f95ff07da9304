//! Field mappings

use crate::error::{field_name, Result};
use serde::ser::Serializer;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Pre-5.x analyzed/not-analyzed string
    String,
    Text,
    Keyword,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    Boolean,
    Date,
    GeoPoint,
    Completion,
    Object,
    Nested,
}

/// The `index` option, either a flag or a pre-5.x string mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOption {
    Enabled(bool),
    Analyzed,
    NotAnalyzed,
    No,
}

impl Serialize for IndexOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            IndexOption::Enabled(b) => serializer.serialize_bool(*b),
            IndexOption::Analyzed => serializer.serialize_str("analyzed"),
            IndexOption::NotAnalyzed => serializer.serialize_str("not_analyzed"),
            IndexOption::No => serializer.serialize_str("no"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMapping {
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    analyzer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_analyzer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<IndexOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignore_above: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preserve_separators: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preserve_position_increments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_input_length: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, FieldMapping>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, FieldMapping>,
}

impl FieldMapping {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            analyzer: None,
            search_analyzer: None,
            index: None,
            ignore_above: None,
            enabled: None,
            format: None,
            preserve_separators: None,
            preserve_position_increments: None,
            max_input_length: None,
            properties: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn keyword() -> Self {
        Self::new(FieldType::Keyword)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn long() -> Self {
        Self::new(FieldType::Long)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn geo_point() -> Self {
        Self::new(FieldType::GeoPoint)
    }

    pub fn completion() -> Self {
        Self::new(FieldType::Completion)
    }

    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn search_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.search_analyzer = Some(analyzer.into());
        self
    }

    pub fn index(mut self, option: IndexOption) -> Self {
        self.index = Some(option);
        self
    }

    pub fn not_analyzed(self) -> Self {
        self.index(IndexOption::NotAnalyzed)
    }

    /// Strings longer than `len` are not indexed
    pub fn ignore_above(mut self, len: u32) -> Self {
        self.ignore_above = Some(len);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn preserve_separators(mut self, preserve: bool) -> Self {
        self.preserve_separators = Some(preserve);
        self
    }

    pub fn preserve_position_increments(mut self, preserve: bool) -> Self {
        self.preserve_position_increments = Some(preserve);
        self
    }

    pub fn max_input_length(mut self, len: u32) -> Self {
        self.max_input_length = Some(len);
        self
    }

    pub fn property(mut self, name: impl Into<String>, mapping: FieldMapping) -> Result<Self> {
        self.properties.insert(field_name(name)?, mapping);
        Ok(self)
    }

    /// Adds a multi-field, indexed from the same source value
    pub fn multi_field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Result<Self> {
        self.fields.insert(field_name(name)?, mapping);
        Ok(self)
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
struct EnabledFlag {
    enabled: bool,
}

/// Mapping of one document type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeMapping {
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    source: Option<EnabledFlag>,
    #[serde(rename = "_all", skip_serializing_if = "Option::is_none")]
    all: Option<EnabledFlag>,
    properties: BTreeMap<String, FieldMapping>,
}

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Result<Self> {
        self.properties.insert(field_name(name)?, mapping);
        Ok(self)
    }

    pub fn source_enabled(mut self, enabled: bool) -> Self {
        self.source = Some(EnabledFlag { enabled });
        self
    }

    /// Pre-6.x `_all` catch-all field
    pub fn all_enabled(mut self, enabled: bool) -> Self {
        self.all = Some(EnabledFlag { enabled });
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, FieldMapping> {
        &self.properties
    }
}
