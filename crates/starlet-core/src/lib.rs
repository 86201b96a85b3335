pub mod config;
pub mod constants;
pub mod feed;
pub mod messaging;
pub mod models;
pub mod scroll;
pub mod store;

// Re-export the types most callers need at the crate root
pub use config::CoreConfig;
pub use feed::{merge, FeedLoader, TierBatch};
pub use models::{Conversation, DeliveryStatus, ListingRecord, ListingTier, MessageRecord};
pub use store::{DocumentStoreClient, MemoryDocStore, MessageCache, StoreError};
