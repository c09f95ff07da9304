//! Query DSL: clause types and the root search request

pub mod request;
pub mod types;

pub use request::{SearchRequest, SourceFilter};
pub use types::*;
