pub mod docstore;
pub mod local;
pub mod memory;
pub mod message_cache;

pub use docstore::{
    Document, DocumentStoreClient, FilterOp, OrderBy, OrderDirection, QueryFilter, Snapshot,
    StoreError, SubscriptionHandle,
};
pub use local::{LocalStore, LocalStoreError, MemoryLocalStore, SqliteStore};
pub use memory::MemoryDocStore;
pub use message_cache::{Clock, MessageCache, SystemClock, CACHE_SCHEMA_VERSION};
