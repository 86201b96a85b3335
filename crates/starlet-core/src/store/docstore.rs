//! Abstract client for the hosted document database.
//!
//! The core never talks to a concrete vendor SDK; every query, write, and
//! live subscription goes through [`DocumentStoreClient`]. Production wires
//! in a real backend, tests and the CLI demo use [`crate::store::MemoryDocStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// A single document: opaque JSON fields plus server-assigned metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Value,
    /// Assigned by the store when the document is first persisted.
    pub created_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Read a string field, `None` if absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    /// Field is an array containing the value.
    Contains,
}

/// One `field <op> value` constraint on a query or subscription.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connectivity: {0}")]
    Connectivity(String),
    #[error("permission denied on {0}")]
    PermissionDenied(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Snapshot pushed to a subscriber whenever matching documents change.
/// Carries the full current set of matching documents, not a delta.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub collection: String,
    pub documents: Vec<Document>,
}

/// Cancellation handle for a live subscription.
///
/// Calling [`unsubscribe`](SubscriptionHandle::unsubscribe) (or dropping the
/// handle) tears the listener down; no snapshots are delivered afterwards.
pub struct SubscriptionHandle {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(id: u64, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .finish()
    }
}

/// The external document-store collaborator.
///
/// All methods may fail with [`StoreError`]; callers decide per call site
/// whether a failure degrades (feed tiers, cache refresh) or is retried
/// (message sends).
#[async_trait]
pub trait DocumentStoreClient: Send + Sync {
    async fn query(
        &self,
        collection: &str,
        filters: &[QueryFilter],
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Register a listener. An initial snapshot of currently-matching
    /// documents is delivered immediately, then one per matching change.
    fn subscribe(
        &self,
        collection: &str,
        filters: Vec<QueryFilter>,
        sender: UnboundedSender<Snapshot>,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Create or overwrite a document. Returns the persisted document with
    /// its server-assigned timestamp.
    async fn write(
        &self,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) -> Result<Document, StoreError>;

    /// Merge `fields` into an existing document.
    async fn update(
        &self,
        collection: &str,
        document_id: &str,
        fields: Value,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, document_id: &str) -> Result<(), StoreError>;
}
