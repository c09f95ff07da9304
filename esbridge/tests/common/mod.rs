//! In-memory stand-in for an Elasticsearch engine.
//!
//! Serves the REST endpoints the client uses over real HTTP on a random
//! port. Writes land in `docs`; only `_refresh` copies them to `visible`,
//! which is what search, count and suggest read, so tests observe the same
//! refresh semantics as against a real engine. Realtime GET reads `docs`.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use esbridge::{Document, Endpoint, EsClient};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

type Source = Map<String, Value>;
type Reply = (StatusCode, Value);

const NUMERIC_TYPES: &[&str] = &["long", "integer", "short", "byte", "double", "float"];

#[derive(Debug, Default)]
struct IndexState {
    properties: Source,
    settings: Value,
    docs: BTreeMap<String, Source>,
    visible: BTreeMap<String, Source>,
    versions: BTreeMap<String, u64>,
}

impl IndexState {
    /// Accepts typeless `{properties}` or `{type: {properties}}`
    fn merge_mappings(&mut self, mappings: &Value) {
        let Some(obj) = mappings.as_object() else {
            return;
        };
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            self.properties.extend(props.clone());
            return;
        }
        for mapping in obj.values() {
            if let Some(props) = mapping.get("properties").and_then(Value::as_object) {
                self.properties.extend(props.clone());
            }
        }
    }

    fn check_types(&self, source: &Source) -> Result<(), String> {
        for (field, value) in source {
            let Some(ty) = self.properties.get(field).and_then(|m| m["type"].as_str()) else {
                continue;
            };
            if NUMERIC_TYPES.contains(&ty) && !is_numeric(value) {
                return Err(format!(
                    "failed to parse field [{}] of type [{}] in document",
                    field, ty
                ));
            }
        }
        Ok(())
    }

    fn write(&mut self, id: &str, source: Source) -> Result<(bool, u64), String> {
        self.check_types(&source)?;
        let created = self.docs.insert(id.to_string(), source).is_none();
        let version = self.versions.entry(id.to_string()).or_insert(0);
        *version += 1;
        Ok((created, *version))
    }

    fn remove(&mut self, id: &str) {
        self.docs.remove(id);
        self.visible.remove(id);
        self.versions.remove(id);
    }
}

#[derive(Debug)]
struct OpenScroll {
    remaining: Vec<Value>,
    page_size: usize,
    total: usize,
}

#[derive(Debug, Default)]
pub struct EngineState {
    indices: BTreeMap<String, IndexState>,
    scrolls: BTreeMap<String, OpenScroll>,
    next_scroll: u64,
    requests: Vec<String>,
}

pub type SharedEngine = Arc<Mutex<EngineState>>;

pub struct FakeEngine {
    pub addr: SocketAddr,
    pub state: SharedEngine,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeEngine {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::http("127.0.0.1", self.addr.port())
    }

    pub fn client(&self) -> EsClient {
        EsClient::new(self.endpoint()).unwrap()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `"METHOD /path"` of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    pub fn open_scrolls(&self) -> usize {
        self.state.lock().scrolls.len()
    }
}

/// Start the fake engine on a random port.
pub async fn start_engine() -> FakeEngine {
    let state: SharedEngine = Arc::new(Mutex::new(EngineState::default()));
    let router = Router::new().fallback(dispatch).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    FakeEngine {
        addr,
        state,
        _handle: handle,
    }
}

/// Documents `1..=n` with `num` = id and a `parity` keyword
pub fn numbered_docs(n: u64) -> Vec<Document> {
    (1..=n)
        .map(|i| {
            Document::new(i.to_string())
                .with_field("num", i)
                .with_field("parity", if i % 2 == 0 { "even" } else { "odd" })
                .with_field("label", format!("item {}", i))
        })
        .collect()
}

// ============================================================================
// HTTP layer
// ============================================================================

async fn dispatch(
    State(state): State<SharedEngine>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    let params: BTreeMap<&str, &str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();

    let mut engine = state.lock();
    engine.requests.push(format!("{} {}", method, uri.path()));

    let (status, value) = match route(&mut engine, &method, &segments, &params, &body) {
        Ok(reply) | Err(reply) => reply,
    };
    if method == Method::HEAD {
        return status.into_response();
    }
    (status, Json(value)).into_response()
}

fn route(
    engine: &mut EngineState,
    method: &Method,
    segments: &[&str],
    params: &BTreeMap<&str, &str>,
    raw: &[u8],
) -> Result<Reply, Reply> {
    let scroll = params.get("scroll").copied();
    match (method.as_str(), segments) {
        ("GET", ["_cluster", "health"]) => Ok(ok(json!({
            "cluster_name": "fake",
            "status": "green",
            "number_of_nodes": 1
        }))),
        ("POST", ["_bulk"]) => engine.bulk(raw),
        ("POST", ["_search", "scroll"]) => engine.next_scroll_page(&json_body(raw)?),
        ("DELETE", ["_search", "scroll"]) => engine.clear_scroll(&json_body(raw)?),
        ("HEAD", [index]) => match engine.indices.contains_key(*index) {
            true => Ok(ok(Value::Null)),
            false => Err(index_not_found(index)),
        },
        ("PUT", [index]) => engine.create_index(index, &json_body(raw)?),
        ("DELETE", [index]) => engine.delete_index(index),
        ("PUT", [index, "_mapping"]) | ("PUT", [index, "_mapping", _]) => {
            engine.put_mapping(index, &json_body(raw)?)
        }
        ("GET", [index, "_mapping"]) => engine.get_mapping(index),
        ("POST", [index, "_refresh"]) => engine.refresh(index),
        ("GET" | "POST", [index, .., "_search"]) => engine.search(index, &json_body(raw)?, scroll),
        ("GET" | "POST", [index, .., "_count"]) => engine.count(index, &json_body(raw)?),
        ("POST", [index, .., "_delete_by_query"]) => engine.delete_by_query(index, &json_body(raw)?),
        ("PUT", [index, doc_type, id]) => engine.index_doc(index, doc_type, id, json_body(raw)?),
        ("GET", [index, doc_type, id]) => engine.get_doc(index, doc_type, id),
        _ => Err(error(
            StatusCode::BAD_REQUEST,
            "illegal_argument_exception",
            format!("no handler for [{}] /{}", method, segments.join("/")),
        )),
    }
}

fn json_body(raw: &[u8]) -> Result<Value, Reply> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(raw).map_err(|e| {
        error(StatusCode::BAD_REQUEST, "parse_exception", e.to_string())
    })
}

fn ok(value: Value) -> Reply {
    (StatusCode::OK, value)
}

fn error(status: StatusCode, error_type: &str, reason: impl Into<String>) -> Reply {
    let reason = reason.into();
    (
        status,
        json!({
            "error": {
                "root_cause": [{"type": error_type, "reason": reason}],
                "type": error_type,
                "reason": reason
            },
            "status": status.as_u16()
        }),
    )
}

fn index_not_found(index: &str) -> Reply {
    error(
        StatusCode::NOT_FOUND,
        "index_not_found_exception",
        format!("no such index [{}]", index),
    )
}

fn bad_query(reason: String) -> Reply {
    error(StatusCode::BAD_REQUEST, "parsing_exception", reason)
}

fn shards() -> Value {
    json!({"total": 1, "successful": 1, "skipped": 0, "failed": 0})
}

// ============================================================================
// Engine operations
// ============================================================================

impl EngineState {
    fn index(&self, name: &str) -> Result<&IndexState, Reply> {
        self.indices.get(name).ok_or_else(|| index_not_found(name))
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut IndexState, Reply> {
        self.indices.get_mut(name).ok_or_else(|| index_not_found(name))
    }

    fn create_index(&mut self, name: &str, body: &Value) -> Result<Reply, Reply> {
        if self.indices.contains_key(name) {
            return Err(error(
                StatusCode::BAD_REQUEST,
                "resource_already_exists_exception",
                format!("index [{}/fAkEuUiD] already exists", name),
            ));
        }
        let mut index = IndexState {
            settings: body.get("settings").cloned().unwrap_or_else(|| json!({})),
            ..IndexState::default()
        };
        if let Some(mappings) = body.get("mappings") {
            index.merge_mappings(mappings);
        }
        self.indices.insert(name.to_string(), index);
        Ok(ok(json!({"acknowledged": true, "shards_acknowledged": true, "index": name})))
    }

    fn delete_index(&mut self, name: &str) -> Result<Reply, Reply> {
        self.indices.remove(name).ok_or_else(|| index_not_found(name))?;
        Ok(ok(json!({"acknowledged": true})))
    }

    fn put_mapping(&mut self, name: &str, body: &Value) -> Result<Reply, Reply> {
        self.index_mut(name)?.merge_mappings(body);
        Ok(ok(json!({"acknowledged": true})))
    }

    fn get_mapping(&self, name: &str) -> Result<Reply, Reply> {
        let index = self.index(name)?;
        Ok(ok(json!({ name: {
            "mappings": {"properties": index.properties},
            "settings": index.settings
        }})))
    }

    fn refresh(&mut self, name: &str) -> Result<Reply, Reply> {
        let index = self.index_mut(name)?;
        index.visible = index.docs.clone();
        Ok(ok(json!({"_shards": shards()})))
    }

    fn index_doc(&mut self, name: &str, doc_type: &str, id: &str, body: Value) -> Result<Reply, Reply> {
        let Value::Object(source) = body else {
            return Err(error(
                StatusCode::BAD_REQUEST,
                "mapper_parsing_exception",
                "failed to parse, document is empty",
            ));
        };
        let index = self.indices.entry(name.to_string()).or_default();
        let (created, version) = index
            .write(id, source)
            .map_err(|reason| error(StatusCode::BAD_REQUEST, "mapper_parsing_exception", reason))?;
        let status = if created { StatusCode::CREATED } else { StatusCode::OK };
        Ok((status, write_reply(name, doc_type, id, created, version)))
    }

    fn get_doc(&self, name: &str, doc_type: &str, id: &str) -> Result<Reply, Reply> {
        let index = self.index(name)?;
        match index.docs.get(id) {
            Some(source) => Ok(ok(json!({
                "_index": name,
                "_type": doc_type,
                "_id": id,
                "_version": index.versions.get(id).copied().unwrap_or(1),
                "found": true,
                "_source": source
            }))),
            None => Err((
                StatusCode::NOT_FOUND,
                json!({"_index": name, "_type": doc_type, "_id": id, "found": false}),
            )),
        }
    }

    fn bulk(&mut self, raw: &[u8]) -> Result<Reply, Reply> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| error(StatusCode::BAD_REQUEST, "parse_exception", e.to_string()))?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let mut items = Vec::new();

        while let Some(action_line) = lines.next() {
            let action: Value = serde_json::from_str(action_line)
                .map_err(|e| error(StatusCode::BAD_REQUEST, "parse_exception", e.to_string()))?;
            let (kind, meta) = single_entry(&action).map_err(bad_query)?;
            let index = meta["_index"].as_str().unwrap_or_default().to_string();
            let doc_type = meta["_type"].as_str().unwrap_or("_doc").to_string();
            let id = meta["_id"].as_str().unwrap_or_default().to_string();

            let item = match kind {
                "index" | "create" => {
                    let source = next_object(&mut lines)?;
                    self.bulk_write(&index, &doc_type, &id, source)
                }
                "update" => {
                    let body = next_object(&mut lines)?;
                    self.bulk_update(&index, &doc_type, &id, &body)
                }
                "delete" => {
                    let found = self
                        .indices
                        .get(&index)
                        .map_or(false, |i| i.docs.contains_key(&id));
                    if let Some(i) = self.indices.get_mut(&index) {
                        i.remove(&id);
                    }
                    json!({"_index": index, "_id": id,
                        "result": if found { "deleted" } else { "not_found" },
                        "status": if found { 200 } else { 404 }})
                }
                other => {
                    return Err(bad_query(format!("unknown bulk action [{}]", other)));
                }
            };
            items.push(json!({ kind: item }));
        }

        let errors = items
            .iter()
            .any(|item| item.as_object().and_then(|o| o.values().next()).map_or(false, |b| b.get("error").is_some()));
        Ok(ok(json!({"took": 1, "errors": errors, "items": items})))
    }

    fn bulk_write(&mut self, name: &str, doc_type: &str, id: &str, source: Source) -> Value {
        let index = self.indices.entry(name.to_string()).or_default();
        match index.write(id, source) {
            Ok((created, version)) => {
                let mut reply = write_reply(name, doc_type, id, created, version);
                reply["status"] = json!(if created { 201 } else { 200 });
                reply
            }
            Err(reason) => item_error(name, id, "mapper_parsing_exception", reason),
        }
    }

    fn bulk_update(&mut self, name: &str, doc_type: &str, id: &str, body: &Source) -> Value {
        let index = self.indices.entry(name.to_string()).or_default();
        let partial = body.get("doc").and_then(Value::as_object).cloned().unwrap_or_default();
        let upsert = body.get("doc_as_upsert").and_then(Value::as_bool).unwrap_or(false);

        let merged = match index.docs.get(id) {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.extend(partial);
                merged
            }
            None if upsert => partial,
            None => {
                let mut reply = item_error(
                    name,
                    id,
                    "document_missing_exception",
                    format!("[{}][{}]: document missing", doc_type, id),
                );
                reply["status"] = json!(404);
                return reply;
            }
        };
        match index.write(id, merged) {
            Ok((created, version)) => {
                let mut reply = write_reply(name, doc_type, id, created, version);
                reply["status"] = json!(if created { 201 } else { 200 });
                reply
            }
            Err(reason) => item_error(name, id, "mapper_parsing_exception", reason),
        }
    }

    /// Visible documents matching the body's query, sorted per its `sort`
    fn matching(&self, name: &str, body: &Value) -> Result<Vec<(String, Source)>, Reply> {
        let index = self.index(name)?;
        let match_all = json!({"match_all": {}});
        let query = body.get("query").unwrap_or(&match_all);

        let mut hits = Vec::new();
        for (id, source) in &index.visible {
            if matches(query, id, source).map_err(bad_query)? {
                hits.push((id.clone(), source.clone()));
            }
        }
        if let Some(sort) = body.get("sort") {
            sort_hits(&mut hits, sort).map_err(bad_query)?;
        }
        Ok(hits)
    }

    fn search(&mut self, name: &str, body: &Value, scroll: Option<&str>) -> Result<Reply, Reply> {
        let matched = self.matching(name, body)?;
        let total = matched.len();
        let from = body["from"].as_u64().unwrap_or(0) as usize;
        let size = body["size"].as_u64().unwrap_or(10) as usize;

        let mut hits: Vec<Value> = matched
            .iter()
            .map(|(id, source)| hit_json(name, id, source, body.get("_source")))
            .collect();

        let mut response = json!({
            "took": 1,
            "timed_out": false,
            "_shards": shards(),
        });

        if let Some(aggs) = body.get("aggs").or_else(|| body.get("aggregations")) {
            let docs: Vec<&Source> = matched.iter().map(|(_, s)| s).collect();
            response["aggregations"] = aggregate_all(aggs, &docs).map_err(bad_query)?;
        }
        if let Some(suggest) = body.get("suggest") {
            response["suggest"] = suggest_all(name, self.index(name)?, suggest).map_err(bad_query)?;
        }

        let page: Vec<Value> = match scroll {
            Some(_) => {
                let rest = hits.split_off(size.min(hits.len()));
                self.next_scroll += 1;
                let scroll_id = format!("fake-scroll-{}", self.next_scroll);
                self.scrolls.insert(
                    scroll_id.clone(),
                    OpenScroll {
                        remaining: rest,
                        page_size: size.max(1),
                        total,
                    },
                );
                response["_scroll_id"] = json!(scroll_id);
                hits
            }
            None => hits.into_iter().skip(from).take(size).collect(),
        };

        response["hits"] = json!({
            "total": {"value": total, "relation": "eq"},
            "max_score": if page.is_empty() { Value::Null } else { json!(1.0) },
            "hits": page
        });
        Ok(ok(response))
    }

    fn next_scroll_page(&mut self, body: &Value) -> Result<Reply, Reply> {
        let scroll_id = body["scroll_id"].as_str().unwrap_or_default();
        let scroll = self.scrolls.get_mut(scroll_id).ok_or_else(|| {
            error(
                StatusCode::NOT_FOUND,
                "search_context_missing_exception",
                format!("No search context found for id [{}]", scroll_id),
            )
        })?;
        let take = scroll.page_size.min(scroll.remaining.len());
        let page: Vec<Value> = scroll.remaining.drain(..take).collect();
        Ok(ok(json!({
            "_scroll_id": scroll_id,
            "took": 1,
            "timed_out": false,
            "hits": {"total": {"value": scroll.total, "relation": "eq"}, "hits": page}
        })))
    }

    fn clear_scroll(&mut self, body: &Value) -> Result<Reply, Reply> {
        let ids: Vec<String> = match &body["scroll_id"] {
            Value::String(id) => vec![id.clone()],
            Value::Array(ids) => ids.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        };
        let freed = ids.iter().filter(|id| self.scrolls.remove(*id).is_some()).count();
        let reply = json!({"succeeded": true, "num_freed": freed});
        if freed == 0 {
            return Err((StatusCode::NOT_FOUND, reply));
        }
        Ok(ok(reply))
    }

    fn count(&self, name: &str, body: &Value) -> Result<Reply, Reply> {
        let count = self.matching(name, body)?.len();
        Ok(ok(json!({"count": count, "_shards": shards()})))
    }

    fn delete_by_query(&mut self, name: &str, body: &Value) -> Result<Reply, Reply> {
        let ids: Vec<String> = self.matching(name, body)?.into_iter().map(|(id, _)| id).collect();
        let index = self.index_mut(name)?;
        for id in &ids {
            index.remove(id);
        }
        Ok(ok(json!({
            "took": 1,
            "timed_out": false,
            "total": ids.len(),
            "deleted": ids.len(),
            "batches": 1,
            "version_conflicts": 0,
            "noops": 0,
            "failures": []
        })))
    }
}

fn write_reply(index: &str, doc_type: &str, id: &str, created: bool, version: u64) -> Value {
    json!({
        "_index": index,
        "_type": doc_type,
        "_id": id,
        "_version": version,
        "result": if created { "created" } else { "updated" },
        "_shards": {"total": 1, "successful": 1, "failed": 0}
    })
}

fn item_error(index: &str, id: &str, error_type: &str, reason: impl Into<String>) -> Value {
    json!({
        "_index": index,
        "_id": id,
        "status": 400,
        "error": {"type": error_type, "reason": reason.into()}
    })
}

fn next_object<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Source, Reply> {
    let line = lines
        .next()
        .ok_or_else(|| bad_query("bulk action without a source line".to_string()))?;
    match serde_json::from_str(line) {
        Ok(Value::Object(source)) => Ok(source),
        _ => Err(bad_query("bulk source must be a JSON object".to_string())),
    }
}

fn hit_json(index: &str, id: &str, source: &Source, filter: Option<&Value>) -> Value {
    let mut hit = json!({"_index": index, "_type": "_doc", "_id": id, "_score": 1.0});
    if let Some(projected) = project(source, filter) {
        hit["_source"] = Value::Object(projected);
    }
    hit
}

/// `_source` filtering; `None` means the source is left out
fn project(source: &Source, filter: Option<&Value>) -> Option<Source> {
    let pick = |fields: &[&str]| -> Source {
        source
            .iter()
            .filter(|(k, _)| fields.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    let names = |v: &Value| -> Vec<String> {
        match v {
            Value::String(s) => vec![s.clone()],
            Value::Array(a) => a.iter().filter_map(|x| x.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        }
    };
    match filter {
        None | Some(Value::Bool(true)) => Some(source.clone()),
        Some(Value::Bool(false)) => None,
        Some(Value::Object(obj)) => {
            let includes = obj.get("includes").map(names).unwrap_or_default();
            let excludes = obj.get("excludes").map(names).unwrap_or_default();
            let mut projected = if includes.is_empty() {
                source.clone()
            } else {
                pick(&includes.iter().map(String::as_str).collect::<Vec<_>>())
            };
            projected.retain(|k, _| !excludes.contains(k));
            Some(projected)
        }
        Some(other) => {
            let fields = names(other);
            Some(pick(&fields.iter().map(String::as_str).collect::<Vec<_>>()))
        }
    }
}

// ============================================================================
// Query evaluation
// ============================================================================

fn single_entry(value: &Value) -> Result<(&str, &Value), String> {
    match value.as_object() {
        Some(obj) if obj.len() == 1 => obj
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| "empty clause".to_string()),
        _ => Err(format!("expected a single-key object, got {}", value)),
    }
}

fn field_values<'a>(doc: &'a Source, field: &str) -> Vec<&'a Value> {
    match doc.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.iter().filter(|v| !v.is_null()).collect(),
        Some(value) => vec![value],
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(values) => values.iter().all(is_numeric),
        other => as_number(other).is_some(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => text_of(a).cmp(&text_of(b)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// `{key: params}` or the bare value form used by term filters
fn param<'a>(params: &'a Value, key: &str) -> &'a Value {
    match params {
        Value::Object(obj) if obj.contains_key(key) => &obj[key],
        other => other,
    }
}

fn clauses<'a>(body: &'a Value, key: &str) -> Vec<&'a Value> {
    match body.get(key) {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn full_match(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| e.to_string())
}

fn wildcard_regex(pattern: &str) -> Result<Regex, String> {
    let translated: String = pattern
        .chars()
        .map(|c| match c {
            '*' => ".*".to_string(),
            '?' => ".".to_string(),
            other => regex::escape(&other.to_string()),
        })
        .collect();
    full_match(&translated)
}

fn matches(query: &Value, id: &str, doc: &Source) -> Result<bool, String> {
    let (kind, body) = single_entry(query)?;
    match kind {
        "match_all" => Ok(true),
        "match_none" => Ok(false),
        "bool" => bool_matches(body, id, doc),
        "ids" => Ok(body["values"]
            .as_array()
            .map_or(false, |ids| ids.iter().any(|v| v.as_str() == Some(id)))),
        "exists" => {
            let field = body["field"].as_str().ok_or("exists needs a field")?;
            Ok(!field_values(doc, field).is_empty())
        }
        "geo_distance" => geo_matches(body, doc),
        _ => {
            let (field, params) = single_entry(body)?;
            leaf_matches(kind, field, params, doc)
        }
    }
}

fn leaf_matches(kind: &str, field: &str, params: &Value, doc: &Source) -> Result<bool, String> {
    let values = field_values(doc, field);
    match kind {
        "term" => {
            let want = param(params, "value");
            Ok(values.iter().any(|v| values_equal(v, want)))
        }
        "terms" => {
            let wants = params.as_array().ok_or("terms needs an array")?;
            Ok(values.iter().any(|v| wants.iter().any(|w| values_equal(v, w))))
        }
        "match" => {
            let wanted = tokens(&text_of(param(params, "query")));
            let have: BTreeSet<String> = values.iter().flat_map(|v| tokens(&text_of(v))).collect();
            let require_all = params["operator"].as_str() == Some("and");
            Ok(if require_all {
                wanted.iter().all(|t| have.contains(t))
            } else {
                wanted.iter().any(|t| have.contains(t))
            })
        }
        "match_phrase" | "match_phrase_prefix" => {
            let phrase = text_of(param(params, "query")).to_lowercase();
            Ok(values.iter().any(|v| text_of(v).to_lowercase().contains(&phrase)))
        }
        "prefix" => {
            let prefix = text_of(param(params, "value"));
            Ok(values.iter().any(|v| text_of(v).starts_with(&prefix)))
        }
        "wildcard" => {
            let re = wildcard_regex(&text_of(param(params, "value")))?;
            Ok(values.iter().any(|v| re.is_match(&text_of(v))))
        }
        "regexp" => {
            let re = full_match(&text_of(param(params, "value")))?;
            Ok(values.iter().any(|v| re.is_match(&text_of(v))))
        }
        "range" => Ok(values.iter().any(|v| in_range(v, params))),
        other => Err(format!("unknown query [{}]", other)),
    }
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let check = |key: &str, accept: fn(Ordering) -> bool| {
        bounds
            .get(key)
            .map_or(true, |bound| accept(compare_values(value, bound)))
    };
    check("gt", |o| o == Ordering::Greater)
        && check("gte", |o| o != Ordering::Less)
        && check("lt", |o| o == Ordering::Less)
        && check("lte", |o| o != Ordering::Greater)
}

fn bool_matches(body: &Value, id: &str, doc: &Source) -> Result<bool, String> {
    for q in clauses(body, "must").into_iter().chain(clauses(body, "filter")) {
        if !matches(q, id, doc)? {
            return Ok(false);
        }
    }
    for q in clauses(body, "must_not") {
        if matches(q, id, doc)? {
            return Ok(false);
        }
    }
    let should = clauses(body, "should");
    let required = match body["minimum_should_match"].as_u64() {
        Some(n) => n as usize,
        None if body.get("must").is_none() && body.get("filter").is_none() && !should.is_empty() => 1,
        None => 0,
    };
    let mut matched = 0;
    for q in should {
        if matches(q, id, doc)? {
            matched += 1;
        }
    }
    Ok(matched >= required)
}

fn parse_distance(text: &str) -> Result<f64, String> {
    let split = text
        .find(|c: char| c.is_alphabetic())
        .ok_or_else(|| format!("distance [{}] has no unit", text))?;
    let (number, unit) = text.split_at(split);
    let value: f64 = number.trim().parse().map_err(|_| format!("bad distance [{}]", text))?;
    let meters = match unit {
        "km" => 1000.0,
        "m" => 1.0,
        "cm" => 0.01,
        "mm" => 0.001,
        "mi" => 1609.344,
        "yd" => 0.9144,
        "ft" => 0.3048,
        "in" => 0.0254,
        "nmi" => 1852.0,
        other => return Err(format!("unknown distance unit [{}]", other)),
    };
    Ok(value * meters)
}

fn lat_lon(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Object(obj) => Some((obj.get("lat")?.as_f64()?, obj.get("lon")?.as_f64()?)),
        Value::String(s) => {
            let (lat, lon) = s.split_once(',')?;
            Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
        }
        _ => None,
    }
}

fn haversine_meters((lat1, lon1): (f64, f64), (lat2, lon2): (f64, f64)) -> f64 {
    let (p1, p2) = (lat1.to_radians(), lat2.to_radians());
    let dp = (lat2 - lat1).to_radians();
    let dl = (lon2 - lon1).to_radians();
    let a = (dp / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dl / 2.0).sin().powi(2);
    2.0 * 6_371_008.8 * a.sqrt().asin()
}

fn geo_matches(body: &Value, doc: &Source) -> Result<bool, String> {
    let obj = body.as_object().ok_or("geo_distance must be an object")?;
    let limit = parse_distance(obj.get("distance").and_then(Value::as_str).ok_or("missing distance")?)?;
    let (field, origin) = obj
        .iter()
        .find(|(k, _)| k.as_str() != "distance" && k.as_str() != "distance_type")
        .ok_or("geo_distance needs a field")?;
    let origin = lat_lon(origin).ok_or("bad geo point")?;
    Ok(field_values(doc, field)
        .into_iter()
        .filter_map(lat_lon)
        .any(|point| haversine_meters(origin, point) <= limit))
}

fn sort_hits(hits: &mut [(String, Source)], sort: &Value) -> Result<(), String> {
    let sort_clauses: Vec<&Value> = match sort {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut keys: Vec<(String, bool)> = Vec::new();
    for clause in sort_clauses {
        match clause {
            Value::String(s) if s == "_doc" || s == "_score" => {}
            Value::String(field) => keys.push((field.clone(), false)),
            Value::Object(_) => {
                let (field, def) = single_entry(clause)?;
                if field == "_score" || field == "_geo_distance" {
                    continue;
                }
                let order = def.get("order").and_then(Value::as_str).or_else(|| def.as_str());
                keys.push((field.to_string(), order == Some("desc")));
            }
            other => return Err(format!("bad sort clause {}", other)),
        }
    }
    hits.sort_by(|(_, a), (_, b)| {
        for (field, desc) in &keys {
            let ordering = match (field_values(a, field).first(), field_values(b, field).first()) {
                (Some(x), Some(y)) if *desc => compare_values(y, x),
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

// ============================================================================
// Aggregations and suggestions
// ============================================================================

fn aggregate_all(aggs: &Value, docs: &[&Source]) -> Result<Value, String> {
    let mut out = Map::new();
    for (name, def) in aggs.as_object().ok_or("aggs must be an object")? {
        out.insert(name.clone(), aggregate(def, docs)?);
    }
    Ok(Value::Object(out))
}

/// Bucket key text, key value and member documents
type Group<'a> = (String, Value, Vec<&'a Source>);

fn by_key(a: &Group<'_>, b: &Group<'_>) -> Ordering {
    compare_values(&a.1, &b.1)
}

fn aggregate(def: &Value, docs: &[&Source]) -> Result<Value, String> {
    let obj = def.as_object().ok_or("aggregation must be an object")?;
    let sub = obj.get("aggs").or_else(|| obj.get("aggregations"));
    let (kind, params) = obj
        .iter()
        .find(|(k, _)| k.as_str() != "aggs" && k.as_str() != "aggregations")
        .ok_or("aggregation without a type")?;
    let field = params["field"].as_str().ok_or("aggregation needs a field")?;

    if kind != "terms" {
        return metric(kind, field, docs);
    }

    let mut groups: BTreeMap<String, (Value, Vec<&Source>)> = BTreeMap::new();
    for &doc in docs {
        let mut seen = BTreeSet::new();
        for value in field_values(doc, field) {
            let key = text_of(value);
            if seen.insert(key.clone()) {
                groups
                    .entry(key)
                    .or_insert_with(|| (value.clone(), Vec::new()))
                    .1
                    .push(doc);
            }
        }
    }

    let include = params["include"].as_str().map(full_match).transpose()?;
    let exclude = params["exclude"].as_str().map(full_match).transpose()?;
    let min_doc_count = params["min_doc_count"].as_u64().unwrap_or(1) as usize;
    let mut buckets: Vec<Group<'_>> = groups
        .into_iter()
        .filter(|(key, _)| include.as_ref().map_or(true, |re| re.is_match(key)))
        .filter(|(key, _)| exclude.as_ref().map_or(true, |re| !re.is_match(key)))
        .filter(|(_, (_, members))| members.len() >= min_doc_count)
        .map(|(key, (value, members))| (key, value, members))
        .collect();

    match single_entry(&params["order"]) {
        Ok(("_key", dir)) if dir == "desc" => buckets.sort_by(|a, b| by_key(b, a)),
        Ok(("_key", _)) => buckets.sort_by(by_key),
        Ok(("_count", dir)) if dir == "asc" => {
            buckets.sort_by(|a, b| a.2.len().cmp(&b.2.len()).then_with(|| by_key(a, b)))
        }
        _ => buckets.sort_by(|a, b| b.2.len().cmp(&a.2.len()).then_with(|| by_key(a, b))),
    }

    // the engine cannot bound the error for ascending count order
    let error_bound = match single_entry(&params["order"]) {
        Ok(("_count", dir)) if dir == "asc" => -1,
        _ => 0,
    };
    let size = params["size"].as_u64().unwrap_or(10) as usize;
    let sum_other: usize = buckets.iter().skip(size).map(|b| b.2.len()).sum();
    let mut out = Vec::new();
    for (_, key, members) in buckets.into_iter().take(size) {
        let mut bucket = json!({"key": key, "doc_count": members.len()});
        if let Some(sub) = sub {
            if let Value::Object(results) = aggregate_all(sub, &members)? {
                bucket.as_object_mut().ok_or("bucket")?.extend(results);
            }
        }
        out.push(bucket);
    }
    Ok(json!({
        "doc_count_error_upper_bound": error_bound,
        "sum_other_doc_count": sum_other,
        "buckets": out
    }))
}

fn metric(kind: &str, field: &str, docs: &[&Source]) -> Result<Value, String> {
    const METRICS: &[&str] = &["avg", "sum", "min", "max", "value_count", "cardinality"];
    if !METRICS.contains(&kind) {
        return Err(format!("unknown aggregation [{}]", kind));
    }
    let values: Vec<&Value> = docs.iter().flat_map(|d| field_values(d, field)).collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| as_number(v)).collect();
    let value = match kind {
        "value_count" => json!(values.len()),
        "cardinality" => json!(values.iter().map(|v| text_of(v)).collect::<BTreeSet<_>>().len()),
        "sum" => json!(numbers.iter().sum::<f64>()),
        _ if numbers.is_empty() => Value::Null,
        "avg" => json!(numbers.iter().sum::<f64>() / numbers.len() as f64),
        "min" => json!(numbers.iter().cloned().fold(f64::INFINITY, f64::min)),
        _ => json!(numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
    };
    Ok(json!({ "value": value }))
}

fn completion_inputs(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(completion_inputs).collect(),
        Value::Object(obj) => obj.get("input").map(completion_inputs).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn suggest_all(name: &str, index: &IndexState, suggest: &Value) -> Result<Value, String> {
    let mut out = Map::new();
    for (suggestion, def) in suggest.as_object().ok_or("suggest must be an object")? {
        let prefix = def["prefix"]
            .as_str()
            .or_else(|| def["text"].as_str())
            .ok_or("suggestion needs a prefix")?;
        let completion = &def["completion"];
        let field = completion["field"].as_str().ok_or("completion needs a field")?;
        let size = completion["size"].as_u64().unwrap_or(5) as usize;
        let skip_duplicates = completion["skip_duplicates"].as_bool().unwrap_or(false);
        let needle = prefix.to_lowercase();

        let mut options: Vec<(String, &String, &Source)> = Vec::new();
        for (id, source) in &index.visible {
            for input in source.get(field).map(completion_inputs).unwrap_or_default() {
                if input.to_lowercase().starts_with(&needle) {
                    options.push((input, id, source));
                }
            }
        }
        options.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        if skip_duplicates {
            options.dedup_by(|a, b| a.0 == b.0);
        }
        let options: Vec<Value> = options
            .into_iter()
            .take(size)
            .map(|(text, id, source)| {
                json!({"text": text, "_index": name, "_id": id, "_score": 1.0, "_source": source})
            })
            .collect();
        out.insert(
            suggestion.clone(),
            json!([{"text": prefix, "offset": 0, "length": prefix.chars().count(), "options": options}]),
        );
    }
    Ok(Value::Object(out))
}
