//! Document store seam.
//!
//! Handlers and services talk to persistence only through [`DocumentStore`].
//! Documents are JSON objects grouped into named collections and addressed
//! by a string id.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Collection names used by the application.
pub mod collections {
    pub const MEDICAL_STAFFS: &str = "medicalStaffs";
    pub const ORDER_REQUESTS: &str = "orderRequests";
    pub const ORDERS: &str = "orders";
    pub const IDENTITY_ACCOUNTS: &str = "identityAccounts";
}

pub type Document = Map<String, Value>;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Document is not a JSON object: {0}")]
    NotAnObject(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality-filtered, optionally ordered and limited query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Keyset page over a collection, ordered by document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Return documents whose id sorts strictly after this one
    pub cursor: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<Document>,
    /// Id of the last returned document when more remain
    pub next_cursor: Option<String>,
}

impl Page {
    /// Build a page from up to `limit + 1` rows sorted by id.
    pub(crate) fn from_overfetch(mut rows: Vec<(String, Document)>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(|(id, _)| id.clone())
        } else {
            None
        };
        Self {
            documents: rows.into_iter().map(|(_, doc)| doc).collect(),
            next_cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    pub write_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Set/delete operations applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, collection: &str, id: &str, data: Document) -> Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn delete(mut self, collection: &str, id: &str) -> Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn list(&self, collection: &str, page: &PageRequest) -> Result<Page, StoreError>;

    /// Create or overwrite a document. Server timestamp sentinels are resolved.
    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<WriteResult, StoreError>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<WriteResult, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Release connections on shutdown.
    async fn close(&self) {}
}

/// Sentinel replaced by the store's write time when the document is written.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(sentinel)
}

fn is_server_timestamp(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// Canonical timestamp encoding; lexicographic order matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn resolve_server_timestamps(data: &mut Document, at: DateTime<Utc>) {
    for value in data.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::String(format_timestamp(at));
        }
    }
}

/// Serialize a model into a document body.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}

pub fn from_document<T: serde::de::DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Field names reach SQL as bound parameters, but are still restricted to
/// plain identifiers so both backends agree on what a field is.
pub(crate) fn validate_field(field: &str) -> Result<(), StoreError> {
    let valid = !field.is_empty()
        && field.len() <= 64
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!("invalid field name '{}'", field)))
    }
}

pub(crate) fn validate_query(query: &Query) -> Result<(), StoreError> {
    for (field, _) in &query.filters {
        validate_field(field)?;
    }
    if let Some(order) = &query.order_by {
        validate_field(&order.field)?;
    }
    Ok(())
}
