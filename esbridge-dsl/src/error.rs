//! Error types for DSL construction

/// Errors raised when a DSL value would describe an invalid request.
///
/// Every check happens in a constructor, so a value that exists is always
/// serializable into a request the engine accepts structurally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DslError {
    #[error("Field name must not be empty")]
    EmptyField,

    #[error("Invalid range on '{field}': {reason}")]
    InvalidRange { field: String, reason: String },

    #[error("Empty value list for '{0}'")]
    EmptyValues(String),

    #[error("Invalid geo distance: {0}")]
    InvalidGeo(String),

    #[error("Invalid aggregation: {0}")]
    InvalidAggregation(String),

    #[error("Invalid suggestion '{name}': {reason}")]
    InvalidSuggestion { name: String, reason: String },

    #[error("Invalid analysis component '{name}': {reason}")]
    InvalidAnalysis { name: String, reason: String },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

/// Result type for DSL construction
pub type Result<T> = std::result::Result<T, DslError>;

pub(crate) fn field_name(field: impl Into<String>) -> Result<String> {
    let field = field.into();
    if field.trim().is_empty() {
        return Err(DslError::EmptyField);
    }
    Ok(field)
}
