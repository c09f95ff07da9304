use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Engine returned {status}: [{error_type}] {reason}")]
    Engine {
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to decode hit '{id}': {reason}")]
    Decode { id: String, reason: String },

    #[error("Invalid document '{id}': {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid request: {0}")]
    Dsl(#[from] esbridge_dsl::DslError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types that mean "this index is already there"
const ALREADY_EXISTS_TYPES: &[&str] = &[
    "resource_already_exists_exception",
    "index_already_exists_exception",
    "IndexAlreadyExistsException",
];

/// `{"error": ..., "status": ...}` body of a failed engine call
#[derive(Debug, Deserialize)]
struct EngineErrorBody {
    error: EngineErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EngineErrorField {
    Detail {
        #[serde(rename = "type")]
        error_type: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Pre-5.x engines report `"IndexAlreadyExistsException[[name] already exists]"`
    Text(String),
}

impl Error {
    /// Classify a non-2xx response body
    pub fn from_engine_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<EngineErrorBody>(body) {
            Ok(EngineErrorBody {
                error: EngineErrorField::Detail { error_type, reason },
            }) => Error::Engine {
                status,
                error_type,
                reason: reason.unwrap_or_default(),
            },
            Ok(EngineErrorBody {
                error: EngineErrorField::Text(text),
            }) => {
                let error_type = text.split('[').next().unwrap_or_default().to_string();
                Error::Engine {
                    status,
                    error_type,
                    reason: text,
                }
            }
            Err(_) => Error::Engine {
                status,
                error_type: "http_error".to_string(),
                reason: body.to_string(),
            },
        }
    }

    /// Whether the engine reported that the index already exists
    pub fn is_index_already_exists(&self) -> bool {
        match self {
            Error::IndexAlreadyExists(_) => true,
            Error::Engine { error_type, .. } => {
                ALREADY_EXISTS_TYPES.contains(&error_type.as_str())
            }
            _ => false,
        }
    }

    /// HTTP status carried by this error, if it came from the engine
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Engine { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
