//! Completion suggestions

use crate::error::{field_name, DslError, Result};
use serde::ser::Serializer;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    Auto,
    Edits(u8),
}

impl Serialize for Fuzziness {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Fuzziness::Auto => serializer.serialize_str("AUTO"),
            Fuzziness::Edits(n) => serializer.serialize_u8(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct FuzzyOptions {
    fuzziness: Fuzziness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct CompletionOptions {
    field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fuzzy: Option<FuzzyOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_duplicates: Option<bool>,
}

/// Prefix completion against a `completion` field.
///
/// Case folding and exact-text fallback come from the field's analyzer on the
/// engine side, not from anything set here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionSuggestion {
    #[serde(skip)]
    name: String,
    prefix: String,
    completion: CompletionOptions,
}

impl CompletionSuggestion {
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let prefix = prefix.into();
        if name.trim().is_empty() {
            return Err(DslError::InvalidSuggestion {
                name,
                reason: "name must not be empty".to_string(),
            });
        }
        if prefix.is_empty() {
            return Err(DslError::InvalidSuggestion {
                name,
                reason: "prefix must not be empty".to_string(),
            });
        }
        Ok(Self {
            completion: CompletionOptions {
                field: field_name(field)?,
                size: None,
                fuzzy: None,
                skip_duplicates: None,
            },
            name,
            prefix,
        })
    }

    pub fn size(mut self, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(DslError::InvalidSuggestion {
                name: self.name,
                reason: "size must be positive".to_string(),
            });
        }
        self.completion.size = Some(size);
        Ok(self)
    }

    pub fn fuzzy(mut self, fuzziness: Fuzziness) -> Self {
        self.completion.fuzzy = Some(FuzzyOptions { fuzziness });
        self
    }

    pub fn skip_duplicates(mut self, skip: bool) -> Self {
        self.completion.skip_duplicates = Some(skip);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
