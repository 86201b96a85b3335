pub mod aggregator;
pub mod loader;

pub use aggregator::{merge, TierBatch};
pub use loader::FeedLoader;
