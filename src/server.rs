//! REST front of the document store.
//!
//! Every route answers JSON: documents or lists of documents on reads, and
//! status objects (`id`, `ids`, `message`, `error`, `matched_count`,
//! `modified_count`, `deleted_count`) on writes.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, put},
};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::domain::DocError;
use crate::shape::Record;
use crate::store::{DocumentStore, StoreOp, StoreResult};

type Reply = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<DocumentStore>>,
    pub collection: String,
}

impl AppState {
    pub fn new(collection: &str) -> Self {
        Self {
            store: Arc::new(RwLock::new(DocumentStore::new().with_collection(collection))),
            collection: collection.to_string(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let base = format!("/{}", state.collection);
    Router::new()
        .route(&base, get(list_items).post(create_items))
        .route(&format!("{base}/query"), get(query_items))
        .route(&format!("{base}/bulk-update"), put(bulk_update))
        .route(&format!("{base}/bulk-delete"), delete(bulk_delete))
        .route(
            &format!("{base}/:id"),
            get(get_item).put(update_item).delete(delete_item),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_reply(status: StatusCode, msg: impl Into<String>) -> Reply {
    (status, Json(json!({ "error": msg.into() })))
}

fn store_error(err: DocError) -> Reply {
    match err {
        DocError::InvalidId(_) => error_reply(StatusCode::BAD_REQUEST, err.to_string()),
        other => {
            error!("Store failure: {other}");
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn unexpected(result: StoreResult) -> Reply {
    error!("Unexpected store result {result:?}");
    error_reply(StatusCode::INTERNAL_SERVER_ERROR, "Unexpected store result")
}

/// Empty body -> `None`. Anything that is not JSON is a 400.
fn parse_body(body: &Bytes) -> Result<Option<Value>, Reply> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| error_reply(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}")))
}

fn object(value: Value, what: &str) -> Result<Record, Reply> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(error_reply(
            StatusCode::BAD_REQUEST,
            format!("{what} must be a JSON object"),
        )),
    }
}

fn documents(docs: Vec<Record>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}

async fn run(state: &AppState, op: StoreOp) -> Result<StoreResult, Reply> {
    let mut store = state.store.write().await;
    store.execute(op, &state.collection).map_err(store_error)
}

macro_rules! try_reply {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(reply) => return reply,
        }
    };
}

async fn create_items(State(state): State<AppState>, body: Bytes) -> Reply {
    let op = match try_reply!(parse_body(&body)) {
        None => return error_reply(StatusCode::BAD_REQUEST, "No data provided"),
        Some(Value::Array(items)) if items.is_empty() => {
            return error_reply(StatusCode::BAD_REQUEST, "No data provided");
        }
        Some(Value::Array(items)) => {
            let mut docs = Vec::with_capacity(items.len());
            for item in items {
                docs.push(try_reply!(object(item, "Every item")));
            }
            StoreOp::InsertMany(docs)
        }
        Some(Value::Object(map)) if map.is_empty() => {
            return error_reply(StatusCode::BAD_REQUEST, "No data provided");
        }
        Some(other) => StoreOp::InsertOne(try_reply!(object(other, "Item"))),
    };
    match try_reply!(run(&state, op).await) {
        StoreResult::Inserted(id) => (StatusCode::CREATED, Json(json!({ "id": id }))),
        StoreResult::InsertedMany(ids) => (StatusCode::CREATED, Json(json!({ "ids": ids }))),
        other => unexpected(other),
    }
}

async fn list_items(State(state): State<AppState>) -> Reply {
    match try_reply!(run(&state, StoreOp::Find(Map::new())).await) {
        StoreResult::Documents(docs) => (StatusCode::OK, Json(documents(docs))),
        other => unexpected(other),
    }
}

async fn query_items(State(state): State<AppState>, body: Bytes) -> Reply {
    let filter = match try_reply!(parse_body(&body)) {
        None => Map::new(),
        Some(v) => try_reply!(object(v, "Query")),
    };
    match try_reply!(run(&state, StoreOp::Find(filter)).await) {
        StoreResult::Documents(docs) => (StatusCode::OK, Json(documents(docs))),
        other => unexpected(other),
    }
}

async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    match try_reply!(run(&state, StoreOp::FindOne(id)).await) {
        StoreResult::Document(Some(doc)) => (StatusCode::OK, Json(Value::Object(doc))),
        _ => error_reply(StatusCode::NOT_FOUND, "Item not found"),
    }
}

async fn update_item(State(state): State<AppState>, Path(id): Path<String>, body: Bytes) -> Reply {
    let set = match try_reply!(parse_body(&body)) {
        Some(Value::Object(map)) if !map.is_empty() => map,
        Some(Value::Object(_)) | None => {
            return error_reply(StatusCode::BAD_REQUEST, "No data provided");
        }
        Some(other) => try_reply!(object(other, "Update")),
    };
    match try_reply!(run(&state, StoreOp::UpdateOne { id, set }).await) {
        StoreResult::Updated { matched, .. } if matched > 0 => {
            (StatusCode::OK, Json(json!({ "message": "Item updated" })))
        }
        _ => error_reply(StatusCode::NOT_FOUND, "Item not found"),
    }
}

async fn bulk_update(State(state): State<AppState>, body: Bytes) -> Reply {
    let envelope = match try_reply!(parse_body(&body)) {
        Some(Value::Object(map)) => map,
        _ => {
            return error_reply(
                StatusCode::BAD_REQUEST,
                "Must provide \"query\" and \"update\" fields",
            );
        }
    };
    let (Some(query), Some(update)) = (envelope.get("query"), envelope.get("update")) else {
        return error_reply(StatusCode::BAD_REQUEST, "Must provide \"query\" and \"update\" fields");
    };
    let filter = try_reply!(object(query.clone(), "Query"));
    let set = try_reply!(object(update.clone(), "Update"));
    match try_reply!(run(&state, StoreOp::UpdateMany { filter, set }).await) {
        StoreResult::Updated { matched, modified } => (
            StatusCode::OK,
            Json(json!({ "matched_count": matched, "modified_count": modified })),
        ),
        other => unexpected(other),
    }
}

async fn delete_item(State(state): State<AppState>, Path(id): Path<String>) -> Reply {
    match try_reply!(run(&state, StoreOp::DeleteOne(id)).await) {
        StoreResult::Deleted(n) if n > 0 => {
            (StatusCode::OK, Json(json!({ "message": "Item deleted" })))
        }
        _ => error_reply(StatusCode::NOT_FOUND, "Item not found"),
    }
}

async fn bulk_delete(State(state): State<AppState>, body: Bytes) -> Reply {
    let query = match try_reply!(parse_body(&body)) {
        Some(Value::Object(mut map)) if map.contains_key("query") => map.shift_remove("query"),
        _ => None,
    };
    let Some(query) = query else {
        return error_reply(StatusCode::BAD_REQUEST, "Must provide \"query\" field");
    };
    let filter = try_reply!(object(query, "Query"));
    match try_reply!(run(&state, StoreOp::DeleteMany(filter)).await) {
        StoreResult::Deleted(n) => (StatusCode::OK, Json(json!({ "deleted_count": n }))),
        other => unexpected(other),
    }
}
