use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;

use super::{
    resolve_server_timestamps, validate_query, Direction, Document, DocumentStore, Page,
    PageRequest, Query, StoreError, WriteBatch, WriteOp, WriteResult,
};

/// In-process document store.
///
/// Collections are id-sorted maps, so keyset paging falls out of a range scan.
/// A batch is applied while holding the single write lock, which makes it
/// atomic with respect to every other operation on the store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn apply(collections: &mut HashMap<String, BTreeMap<String, Document>>, op: WriteOp, at: chrono::DateTime<Utc>) {
        match op {
            WriteOp::Set { collection, id, mut data } => {
                resolve_server_timestamps(&mut data, at);
                collections.entry(collection).or_default().insert(id, data);
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }
}

fn matches_filters(doc: &Document, filters: &[(String, Value)]) -> bool {
    filters
        .iter()
        .all(|(field, expected)| doc.get(field) == Some(expected))
}

/// Missing fields sort before everything; mixed types fall back to their JSON text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        validate_query(query)?;

        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(&String, &Document)> = docs
            .iter()
            .filter(|(_, doc)| matches_filters(doc, &query.filters))
            .collect();

        if let Some(order) = &query.order_by {
            matched.sort_by(|(id_a, a), (id_b, b)| {
                let ord = compare_values(a.get(&order.field), b.get(&order.field));
                let ord = match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| id_a.cmp(id_b))
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched.into_iter().take(limit).map(|(_, doc)| doc.clone()).collect())
    }

    async fn list(&self, collection: &str, page: &PageRequest) -> Result<Page, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Page::default());
        };

        let lower = match &page.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };

        let rows = docs
            .range((lower, Bound::Unbounded))
            .take(page.limit + 1)
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect();

        Ok(Page::from_overfetch(rows, page.limit))
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<WriteResult, StoreError> {
        self.commit(WriteBatch::new().set(collection, id, data)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError> {
        self.commit(WriteBatch::new().delete(collection, id)).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<WriteResult, StoreError> {
        let write_time = Utc::now();
        let mut collections = self.collections.write().await;
        for op in batch.ops {
            Self::apply(&mut collections, op, write_time);
        }
        Ok(WriteResult { write_time })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{format_timestamp, server_timestamp};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test documents must be objects"),
        }
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("things", "a", doc(json!({ "n": 1 }))).await.unwrap();

        let found = store.get("things", "a").await.unwrap();
        assert_eq!(found, Some(doc(json!({ "n": 1 }))));

        store.delete("things", "a").await.unwrap();
        assert!(store.get("things", "a").await.unwrap().is_none());

        // Deleting again is fine
        store.delete("things", "a").await.unwrap();
    }

    #[tokio::test]
    async fn set_resolves_server_timestamp() {
        let store = MemoryStore::new();
        let mut data = doc(json!({ "n": 1 }));
        data.insert("at".to_string(), server_timestamp());

        let result = store.set("things", "a", data).await.unwrap();
        let stored = store.get("things", "a").await.unwrap().unwrap();
        assert_eq!(stored["at"], json!(format_timestamp(result.write_time)));
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (id, email, at) in [
            ("u1_1", "a@x", "2024-01-01T00:00:00.000Z"),
            ("u1_2", "a@x", "2024-01-03T00:00:00.000Z"),
            ("u1_3", "a@x", "2024-01-02T00:00:00.000Z"),
            ("u2_1", "b@x", "2024-01-04T00:00:00.000Z"),
        ] {
            store
                .set("reqs", id, doc(json!({ "docId": id, "email": email, "requestedAt": at })))
                .await
                .unwrap();
        }

        let query = Query::new()
            .where_eq("email", "a@x")
            .order_by("requestedAt", Direction::Descending)
            .limit(2);
        let found = store.query("reqs", &query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d["docId"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["u1_2", "u1_3"]);
    }

    #[tokio::test]
    async fn query_rejects_bad_field() {
        let store = MemoryStore::new();
        let err = store
            .query("reqs", &Query::new().where_eq("e mail", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn list_pages_by_id() {
        let store = MemoryStore::new();
        for id in ["c", "a", "e", "b", "d"] {
            store.set("things", id, doc(json!({ "id": id }))).await.unwrap();
        }

        let first = store
            .list("things", &PageRequest { cursor: None, limit: 2 })
            .await
            .unwrap();
        assert_eq!(first.documents.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("b"));

        let second = store
            .list("things", &PageRequest { cursor: first.next_cursor.clone(), limit: 2 })
            .await
            .unwrap();
        assert_eq!(second.documents[0]["id"], json!("c"));
        assert_eq!(second.next_cursor.as_deref(), Some("d"));

        let last = store
            .list("things", &PageRequest { cursor: second.next_cursor.clone(), limit: 2 })
            .await
            .unwrap();
        assert_eq!(last.documents.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn list_missing_collection_is_empty() {
        let store = MemoryStore::new();
        let page = store
            .list("nothing", &PageRequest { cursor: None, limit: 10 })
            .await
            .unwrap();
        assert!(page.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn commit_moves_document_between_collections() {
        let store = MemoryStore::new();
        store.set("pending", "d1", doc(json!({ "v": 1 }))).await.unwrap();

        let batch = WriteBatch::new()
            .delete("pending", "d1")
            .set("done", "d1", doc(json!({ "v": 2 })));
        store.commit(batch).await.unwrap();

        assert!(store.get("pending", "d1").await.unwrap().is_none());
        assert_eq!(store.get("done", "d1").await.unwrap(), Some(doc(json!({ "v": 2 }))));
        assert_eq!(store.count("pending").await, 0);
        assert_eq!(store.count("done").await, 1);
    }
}
