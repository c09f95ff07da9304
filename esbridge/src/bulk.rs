//! `_bulk` request encoding (NDJSON: one action line, one source line)

use crate::document::Document;
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
struct BulkMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum BulkAction<'a> {
    Index(BulkMeta<'a>),
    Update(BulkMeta<'a>),
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    doc: &'a Map<String, Value>,
    doc_as_upsert: bool,
}

/// `_type` is left out for typeless engines
pub(crate) fn explicit_type(doc_type: &str) -> Option<&str> {
    match doc_type {
        "" | "_doc" => None,
        t => Some(t),
    }
}

fn push_line<T: Serialize>(out: &mut String, value: &T) -> Result<()> {
    out.push_str(&serde_json::to_string(value)?);
    out.push('\n');
    Ok(())
}

/// Index actions: create or overwrite each document
pub(crate) fn encode_index(index: &str, doc_type: &str, docs: &[Document]) -> Result<String> {
    let mut out = String::new();
    for doc in docs {
        doc.validate()?;
        let meta = BulkMeta {
            index,
            doc_type: explicit_type(doc_type),
            id: doc.id(),
        };
        push_line(&mut out, &BulkAction::Index(meta))?;
        push_line(&mut out, doc.fields())?;
    }
    Ok(out)
}

/// Partial updates, inserting documents that do not exist yet
pub(crate) fn encode_update(index: &str, doc_type: &str, docs: &[Document]) -> Result<String> {
    let mut out = String::new();
    for doc in docs {
        doc.validate()?;
        let meta = BulkMeta {
            index,
            doc_type: explicit_type(doc_type),
            id: doc.id(),
        };
        push_line(&mut out, &BulkAction::Update(meta))?;
        push_line(
            &mut out,
            &UpsertBody {
                doc: doc.fields(),
                doc_as_upsert: true,
            },
        )?;
    }
    Ok(out)
}
