use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// A document to index: id plus source fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_fields(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build from any value that serializes to a JSON object
    pub fn from_serialize<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self> {
        let id = id.into();
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self { id, fields }),
            other => Err(Error::InvalidDocument {
                id,
                reason: format!("source must be a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidDocument {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
