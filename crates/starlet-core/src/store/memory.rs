//! In-process implementation of [`DocumentStoreClient`].
//!
//! Backs the unit tests and the CLI demo. Supports failure injection so the
//! retry pipeline can be exercised without a flaky network.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use super::docstore::{
    Document, DocumentStoreClient, FilterOp, OrderBy, OrderDirection, QueryFilter, Snapshot,
    StoreError, SubscriptionHandle,
};

struct Subscriber {
    collection: String,
    filters: Vec<QueryFilter>,
    sender: UnboundedSender<Snapshot>,
}

#[derive(Default)]
pub struct MemoryDocStore {
    // BTreeMap keeps query results deterministic without an explicit order_by
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    subscribers: Arc<Mutex<HashMap<u64, Subscriber>>>,
    next_sub_id: AtomicU64,
    fail_writes: AtomicU32,
    fail_queries: AtomicU32,
}

impl MemoryDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` write calls fail with a connectivity error.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, AtomicOrdering::SeqCst);
    }

    /// Make the next `n` query calls fail with a connectivity error.
    pub fn fail_next_queries(&self, n: u32) {
        self.fail_queries.store(n, AtomicOrdering::SeqCst);
    }

    /// Number of listeners currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Seed a document without notifying subscribers; for test fixtures.
    pub fn seed(&self, collection: &str, document_id: &str, fields: Value) -> Document {
        let doc = Document {
            id: document_id.to_string(),
            fields,
            created_at: Some(Utc::now()),
        };
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(document_id.to_string(), doc.clone());
        doc
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
    }

    fn matching_documents(&self, collection: &str, filters: &[QueryFilter]) -> Vec<Document> {
        let collections = self.collections.lock();
        collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filters.iter().all(|f| filter_matches(doc, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push a fresh snapshot to every subscriber whose filters match the
    /// changed collection. Dead senders are dropped from the registry.
    fn notify(&self, collection: &str) {
        let snapshots: Vec<(u64, Snapshot)> = {
            let subscribers = self.subscribers.lock();
            subscribers
                .iter()
                .filter(|(_, s)| s.collection == collection)
                .map(|(id, s)| {
                    (
                        *id,
                        Snapshot {
                            collection: collection.to_string(),
                            documents: self.matching_documents(collection, &s.filters),
                        },
                    )
                })
                .collect()
        };

        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.lock();
            for (id, snapshot) in snapshots {
                if let Some(sub) = subscribers.get(&id) {
                    if sub.sender.send(snapshot).is_err() {
                        dead.push(id);
                    }
                }
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }
}

#[async_trait]
impl DocumentStoreClient for MemoryDocStore {
    async fn query(
        &self,
        collection: &str,
        filters: &[QueryFilter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        if Self::take_failure(&self.fail_queries) {
            return Err(StoreError::Connectivity("injected query failure".into()));
        }

        let mut docs = self.matching_documents(collection, filters);

        if let Some(order) = order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(
                    a.fields.get(&order.field).unwrap_or(&Value::Null),
                    b.fields.get(&order.field).unwrap_or(&Value::Null),
                );
                match order.direction {
                    OrderDirection::Asc => ord,
                    OrderDirection::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = limit {
            docs.truncate(limit);
        }

        Ok(docs)
    }

    fn subscribe(
        &self,
        collection: &str,
        filters: Vec<QueryFilter>,
        sender: UnboundedSender<Snapshot>,
    ) -> Result<SubscriptionHandle, StoreError> {
        let id = self.next_sub_id.fetch_add(1, AtomicOrdering::SeqCst);

        // Initial snapshot of whatever matches right now
        let initial = Snapshot {
            collection: collection.to_string(),
            documents: self.matching_documents(collection, &filters),
        };
        let _ = sender.send(initial);

        self.subscribers.lock().insert(
            id,
            Subscriber {
                collection: collection.to_string(),
                filters,
                sender,
            },
        );

        let registry = Arc::clone(&self.subscribers);
        Ok(SubscriptionHandle::new(id, move || {
            registry.lock().remove(&id);
        }))
    }

    async fn write(
        &self,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) -> Result<Document, StoreError> {
        if Self::take_failure(&self.fail_writes) {
            return Err(StoreError::Connectivity("injected write failure".into()));
        }

        let doc = Document {
            id: document_id.to_string(),
            fields,
            created_at: Some(Utc::now()),
        };
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(document_id.to_string(), doc.clone());

        self.notify(collection);
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) -> Result<(), StoreError> {
        if Self::take_failure(&self.fail_writes) {
            return Err(StoreError::Connectivity("injected write failure".into()));
        }

        {
            let mut collections = self.collections.lock();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(document_id))
                .ok_or_else(|| StoreError::NotFound(format!("{collection}/{document_id}")))?;

            if let (Value::Object(existing), Value::Object(incoming)) = (&mut doc.fields, fields) {
                for (k, v) in incoming {
                    existing.insert(k, v);
                }
            }
        }

        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StoreError> {
        let removed = self
            .collections
            .lock()
            .get_mut(collection)
            .and_then(|docs| docs.remove(document_id));

        if removed.is_none() {
            return Err(StoreError::NotFound(format!("{collection}/{document_id}")));
        }
        self.notify(collection);
        Ok(())
    }
}

fn filter_matches(doc: &Document, filter: &QueryFilter) -> bool {
    let actual = doc.fields.get(&filter.field).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => actual == &filter.value,
        FilterOp::Gte => compare_values(actual, &filter.value) != Ordering::Less,
        FilterOp::Lte => compare_values(actual, &filter.value) != Ordering::Greater,
        FilterOp::Contains => actual
            .as_array()
            .is_some_and(|arr| arr.contains(&filter.value)),
    }
}

/// Total order over the JSON value subsets we query on (numbers, strings).
/// Mixed or unsupported types compare as equal, which keeps sorts stable.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_query_with_filter_and_order() {
        let store = MemoryDocStore::new();
        store.seed("listings", "a", json!({"price": 100, "status": "approved"}));
        store.seed("listings", "b", json!({"price": 300, "status": "approved"}));
        store.seed("listings", "c", json!({"price": 200, "status": "pending"}));

        let docs = store
            .query(
                "listings",
                &[QueryFilter::eq("status", "approved")],
                Some(OrderBy::desc("price")),
                None,
            )
            .await
            .unwrap();

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_injected_query_failure_is_transient() {
        let store = MemoryDocStore::new();
        store.seed("listings", "a", json!({"status": "approved"}));
        store.fail_next_queries(1);

        assert!(store.query("listings", &[], None, None).await.is_err());
        // Next call succeeds again
        assert_eq!(store.query("listings", &[], None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_receives_initial_and_change_snapshots() {
        let store = MemoryDocStore::new();
        store.seed("messages", "m1", json!({"conversation_id": "c1"}));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = store
            .subscribe(
                "messages",
                vec![QueryFilter::eq("conversation_id", "c1")],
                tx,
            )
            .unwrap();

        let initial = rx.recv().await.unwrap();
        assert_eq!(initial.documents.len(), 1);

        store
            .write("messages", "m2", json!({"conversation_id": "c1"}))
            .await
            .unwrap();
        let next = rx.recv().await.unwrap();
        assert_eq!(next.documents.len(), 2);

        // A write to a different conversation still notifies (same collection),
        // but the snapshot only contains matching documents.
        store
            .write("messages", "m3", json!({"conversation_id": "c2"}))
            .await
            .unwrap();
        let other = rx.recv().await.unwrap();
        assert_eq!(other.documents.len(), 2);

        handle.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_handle_unsubscribes() {
        let store = MemoryDocStore::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        {
            let _handle = store.subscribe("messages", vec![], tx).unwrap();
            assert_eq!(store.subscriber_count(), 1);
        }
        assert_eq!(store.subscriber_count(), 0);
    }
}
