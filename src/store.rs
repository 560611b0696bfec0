use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::DocError;
use crate::shape::Record;

pub const ID_FIELD: &str = "_id";
const ID_LEN: usize = 24;

/// New 24 character lowercase hex id.
pub fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()[..ID_LEN].to_string()
}

pub fn validate_id(id: &str) -> Result<(), DocError> {
    if id.len() == ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(DocError::InvalidId(format!(
            "'{id}' is not a valid ObjectId, it must be a 24-character hex string"
        )))
    }
}

/// Every pair of the filter must equal the document's top level field.
fn matches(doc: &Record, filter: &Record) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

/// Merge `set` into `doc`; returns whether anything changed.
fn apply_set(doc: &mut Record, set: &Record) -> bool {
    let mut changed = false;
    for (k, v) in set {
        if k == ID_FIELD {
            continue;
        }
        if doc.get(k) != Some(v) {
            doc.insert(k.clone(), v.clone());
            changed = true;
        }
    }
    changed
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    InsertOne(Record),
    InsertMany(Vec<Record>),
    Find(Record),
    FindOne(String),
    UpdateOne { id: String, set: Record },
    UpdateMany { filter: Record, set: Record },
    DeleteOne(String),
    DeleteMany(Record),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreResult {
    Inserted(String),
    InsertedMany(Vec<String>),
    Documents(Vec<Record>),
    Document(Option<Record>),
    Updated { matched: usize, modified: usize },
    Deleted(usize),
}

/// In-memory collections of ordered JSON documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    collections: HashMap<String, Vec<Record>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: &str) -> Self {
        self.collections.entry(name.to_string()).or_default();
        self
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Vec<Record>, DocError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| DocError::UnknownCollection(name.to_string()))
    }

    fn collection(&self, name: &str) -> Result<&Vec<Record>, DocError> {
        self.collections
            .get(name)
            .ok_or_else(|| DocError::UnknownCollection(name.to_string()))
    }

    pub fn execute(&mut self, op: StoreOp, collection: &str) -> Result<StoreResult, DocError> {
        debug!("{collection}: {op:?}");
        let result = match op {
            StoreOp::InsertOne(doc) => StoreResult::Inserted(self.insert(collection, doc)?),
            StoreOp::InsertMany(docs) => {
                let mut ids = Vec::with_capacity(docs.len());
                for doc in docs {
                    ids.push(self.insert(collection, doc)?);
                }
                StoreResult::InsertedMany(ids)
            }
            StoreOp::Find(filter) => StoreResult::Documents(
                self.collection(collection)?
                    .iter()
                    .filter(|d| matches(d, &filter))
                    .cloned()
                    .collect(),
            ),
            StoreOp::FindOne(id) => {
                validate_id(&id)?;
                StoreResult::Document(
                    self.collection(collection)?
                        .iter()
                        .find(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()))
                        .cloned(),
                )
            }
            StoreOp::UpdateOne { id, set } => {
                validate_id(&id)?;
                let doc = self
                    .collection_mut(collection)?
                    .iter_mut()
                    .find(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()));
                match doc {
                    Some(doc) => {
                        let modified = apply_set(doc, &set) as usize;
                        StoreResult::Updated { matched: 1, modified }
                    }
                    None => StoreResult::Updated { matched: 0, modified: 0 },
                }
            }
            StoreOp::UpdateMany { filter, set } => {
                let mut matched = 0;
                let mut modified = 0;
                for doc in self
                    .collection_mut(collection)?
                    .iter_mut()
                    .filter(|d| matches(d, &filter))
                {
                    matched += 1;
                    if apply_set(doc, &set) {
                        modified += 1;
                    }
                }
                StoreResult::Updated { matched, modified }
            }
            StoreOp::DeleteOne(id) => {
                validate_id(&id)?;
                let docs = self.collection_mut(collection)?;
                let pos = docs
                    .iter()
                    .position(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()));
                StoreResult::Deleted(match pos {
                    Some(p) => {
                        docs.remove(p);
                        1
                    }
                    None => 0,
                })
            }
            StoreOp::DeleteMany(filter) => {
                let docs = self.collection_mut(collection)?;
                let before = docs.len();
                docs.retain(|d| !matches(d, &filter));
                StoreResult::Deleted(before - docs.len())
            }
        };
        Ok(result)
    }

    /// Stores `doc` with a fresh `_id` placed first, so it leads the column order.
    fn insert(&mut self, collection: &str, doc: Record) -> Result<String, DocError> {
        let id = new_object_id();
        let mut stored = Map::with_capacity(doc.len() + 1);
        stored.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        stored.extend(doc.into_iter().filter(|(k, _)| k != ID_FIELD));
        self.collection_mut(collection)?.push(stored);
        info!("{collection}: inserted {id}");
        Ok(id)
    }
}
